//! Cancellation for a running fetch.
//!
//! A `CancelToken` is a shared abort flag. The orchestrator checks it between
//! steps and the HTTP transfers poll it from curl's progress callback, so a
//! cancel request stops a long download promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable abort flag; all clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
