// src/orchestrator/signal.rs - Cooperative stop flag shared by the driver and its observers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable stop request. Readers never contend with each other.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent. Returns true only for the call that raised the flag.
    pub fn stop(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
