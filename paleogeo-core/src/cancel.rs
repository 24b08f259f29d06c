//! Cooperative cancellation flag shared between the foreground and a worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared cancellation flag, checked by workers between units of work.
///
/// The foreground sets it via [`CancelToken::request_cancel`]; the
/// controller clears it with [`CancelToken::reset`] strictly before a new
/// worker is started. That ordering is what makes the two-writer design
/// race-free; nothing else may call `reset`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-canceled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the current run.
    pub fn request_cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clears the flag ahead of a new run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
