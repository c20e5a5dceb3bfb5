// src/utils/progress_bars/logging.rs - Logging helpers for batch runs
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct BatchLogger {
    run_id: String,
    start_time: Instant,
}

impl BatchLogger {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            start_time: Instant::now(),
        }
    }

    fn tag(&self) -> &str {
        // Short prefix keeps interleaved runs distinguishable in the log.
        self.run_id.get(..8).unwrap_or(&self.run_id)
    }

    pub fn log_start(&self, total_records: usize, client_id: Option<&str>, project_id: Option<&str>) {
        info!(
            "[BATCH {}] 🚀 Starting batch over {} records (client: {}, project: {})",
            self.tag(),
            total_records,
            client_id.unwrap_or("-"),
            project_id.unwrap_or("-")
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        let msg = if let Some(details) = details {
            format!(
                "[BATCH {}] 🔄 Phase: {} - {} [+{:.1}s]",
                self.tag(),
                phase,
                details,
                elapsed.as_secs_f32()
            )
        } else {
            format!(
                "[BATCH {}] 🔄 Phase: {} [+{:.1}s]",
                self.tag(),
                phase,
                elapsed.as_secs_f32()
            )
        };
        info!("{}", msg);
    }

    pub fn log_stage_complete(&self, stage: &str, items: usize, duration: Duration) {
        info!(
            "[BATCH {}] ✅ {} complete: {} items in {:.2?}",
            self.tag(),
            stage,
            items,
            duration
        );
    }

    pub fn log_record_error(&self, index: usize, message: &str) {
        warn!(
            "[BATCH {}] ⚠️  Record #{} failed: {}",
            self.tag(),
            index,
            message
        );
    }

    pub fn log_provider_fallback(&self, index: usize, message: &str) {
        debug!(
            "[BATCH {}] Record #{} left unenriched: {}",
            self.tag(),
            index,
            message
        );
    }

    pub fn log_stop(&self, processed: usize, total: usize) {
        warn!(
            "[BATCH {}] 🛑 Stopped by user after {}/{} records [+{:.1}s]",
            self.tag(),
            processed,
            total,
            self.start_time.elapsed().as_secs_f32()
        );
    }

    pub fn log_failure(&self, message: &str) {
        error!("[BATCH {}] ❌ Batch failed: {}", self.tag(), message);
    }

    pub fn log_completion(
        &self,
        processed: usize,
        duplicate_groups: usize,
        duplicates: usize,
        enriched: usize,
        errors: usize,
    ) {
        let duration = self.start_time.elapsed();
        info!(
            "[BATCH {}] 🎉 COMPLETED: {} records processed in {:.2?}",
            self.tag(),
            processed,
            duration
        );
        info!(
            "[BATCH {}] 📊 Results: {} duplicate groups ({} records), {} enriched, {} errors",
            self.tag(),
            duplicate_groups,
            duplicates,
            enriched,
            errors
        );
    }

    /// Throughput line; skipped when nothing was processed.
    pub fn log_performance_summary(&self, processed: usize, memory_mb: Option<u64>) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if processed == 0 || elapsed <= 0.0 {
            return;
        }
        info!(
            "[BATCH {}] ⚡ Throughput: {:.1} records/s, {:.2} ms per record",
            self.tag(),
            processed as f64 / elapsed,
            elapsed * 1000.0 / processed as f64
        );
        if let Some(memory_mb) = memory_mb {
            info!("[BATCH {}] 💾 Memory usage: {} MB", self.tag(), memory_mb);
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
