// src/utils/progress_bars/progress_callback.rs - Progress callbacks and the bounded, lossy event sink

use log::debug;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Type alias for progress callback functions
/// Takes phase name and optional detailed progress information
pub type ProgressCallback = Arc<dyn Fn(String, Option<String>) + Send + Sync>;

/// One human-readable progress line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub phase: String,
    pub details: Option<String>,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{} - {}", self.phase, details),
            None => f.write_str(&self.phase),
        }
    }
}

/// Producer side of a bounded progress stream.
///
/// Never waits on the consumer: when the buffer is full (or the receiver is gone)
/// the event is dropped and counted.
#[derive(Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
    dropped: Arc<AtomicUsize>,
}

impl ProgressSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicUsize::new(0)),
            },
            rx,
        )
    }

    /// Returns false when the event was dropped.
    pub fn emit(&self, phase: String, details: Option<String>) -> bool {
        match self.tx.try_send(ProgressEvent { phase, details }) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) | Err(TrySendError::Closed(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Progress buffer unavailable, dropped '{}' ({} dropped so far)", event, dropped);
                false
            }
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Adapts the sink to the callback shape used across the crate.
    pub fn callback(&self) -> ProgressCallback {
        let sink = self.clone();
        Arc::new(move |phase: String, details: Option<String>| {
            sink.emit(phase, details);
        })
    }
}

/// Helper function to create a simple progress callback that only logs
pub fn create_simple_callback(method_name: &str) -> ProgressCallback {
    let method_name = method_name.to_string();
    Arc::new(move |phase: String, details: Option<String>| {
        let detail_str = details.map(|d| format!(" - {}", d)).unwrap_or_default();
        debug!("[{}] Progress: {}{}", method_name, phase, detail_str);
    })
}

/// Convenience macro for reporting a phase through an `Option<ProgressCallback>`
#[macro_export]
macro_rules! update_progress {
    ($callback:expr, $phase:expr) => {
        if let Some(ref cb) = $callback {
            cb($phase.to_string(), None);
        }
    };
    ($callback:expr, $phase:expr, $details:expr) => {
        if let Some(ref cb) = $callback {
            cb($phase.to_string(), Some($details.to_string()));
        }
    };
}

/// Convenience macro for updating progress with detailed information
#[macro_export]
macro_rules! update_detailed_progress {
    ($callback:expr, $phase:expr, $current:expr, $total:expr) => {
        if let Some(ref cb) = $callback {
            let details = format!("{}/{}", $current, $total);
            cb($phase.to_string(), Some(details));
        }
    };
    ($callback:expr, $phase:expr, $current:expr, $total:expr, $extra:expr) => {
        if let Some(ref cb) = $callback {
            let details = format!("{}/{} ({})", $current, $total, $extra);
            cb($phase.to_string(), Some(details));
        }
    };
}

/// Progress tracking helper for one stage of a run
pub struct ProgressTracker {
    callback: Option<ProgressCallback>,
    current_phase: String,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            current_phase: "Initializing".to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn set_phase(&mut self, phase: &str) {
        self.current_phase = phase.to_string();
        self.start_time = Instant::now();
        if let Some(ref cb) = self.callback {
            cb(phase.to_string(), None);
        }
    }

    pub fn update_progress(&self, current: usize, total: usize) {
        if let Some(ref cb) = self.callback {
            let details = format!("{}/{}", current, total);
            cb(self.current_phase.clone(), Some(details));
        }
    }

    pub fn update_progress_with_info(&self, current: usize, total: usize, info: &str) {
        if let Some(ref cb) = self.callback {
            let details = format!("{}/{} ({})", current, total, info);
            cb(self.current_phase.clone(), Some(details));
        }
    }

    pub fn finish_phase(&self, summary: &str) {
        if let Some(ref cb) = self.callback {
            let elapsed = self.start_time.elapsed();
            let details = format!("{} in {:.2}s", summary, elapsed.as_secs_f64());
            cb(format!("{} complete", self.current_phase), Some(details));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_tracker() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = Arc::clone(&call_count);

        let callback: ProgressCallback = Arc::new(move |_phase: String, _details: Option<String>| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let mut tracker = ProgressTracker::new(Some(callback));
        tracker.set_phase("Testing");
        tracker.update_progress(50, 100);
        tracker.update_progress_with_info(60, 100, "2 errors");
        tracker.finish_phase("done");

        assert_eq!(call_count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_sink_drops_when_full_without_blocking() {
        let (sink, mut rx) = ProgressSink::channel(2);
        assert!(sink.emit("Extracting".into(), Some("10/100".into())));
        assert!(sink.emit("Extracting".into(), Some("20/100".into())));
        assert!(!sink.emit("Extracting".into(), Some("30/100".into())));
        assert_eq!(sink.dropped(), 1);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.to_string(), "Extracting - 10/100");
        // Space freed by the consumer is usable again.
        assert!(sink.emit("Clustering".into(), None));
        assert_eq!(rx.recv().await.unwrap().details.as_deref(), Some("20/100"));
        assert_eq!(rx.recv().await.unwrap().to_string(), "Clustering");
    }

    #[tokio::test]
    async fn test_sink_counts_events_after_receiver_closed() {
        let (sink, rx) = ProgressSink::channel(4);
        drop(rx);
        let callback = sink.callback();
        callback("Enriching".to_string(), None);
        assert_eq!(sink.dropped(), 1);
    }

    #[test]
    fn test_macros_with_callback() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let callback: Option<ProgressCallback> = Some(Arc::new(move |phase: String, details: Option<String>| {
            seen_clone.lock().unwrap().push(ProgressEvent { phase, details });
        }));
        update_progress!(callback, "Clustering");
        update_detailed_progress!(callback, "Clustering", 5, 10);
        update_detailed_progress!(callback, "Clustering", 10, 10, "3 clusters");

        let none: Option<ProgressCallback> = None;
        update_progress!(none, "ignored", "details");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].details.as_deref(), Some("5/10"));
        assert_eq!(seen[2].to_string(), "Clustering - 10/10 (3 clusters)");
    }

    #[test]
    fn test_simple_callback_creation() {
        let callback = create_simple_callback("TestMethod");
        callback("TestPhase".to_string(), Some("TestDetails".to_string()));
        callback("TestPhase2".to_string(), None);
    }
}
