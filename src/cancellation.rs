//! Cooperative stop signal for the reader thread.
//!
//! # Example
//!
//! ```
//! use framewindow::CancellationToken;
//!
//! let token = CancellationToken::new();
//! assert!(!token.is_cancelled());
//!
//! // From another thread (or a signal handler, etc.):
//! token.cancel();
//! assert!(token.is_cancelled());
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Stop flag backed by an [`AtomicBool`].
///
/// Clones share state. The reader checks it at the top of its loop and after
/// every blocking pop or seek; there is no per-request cancellation.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request a stop. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether a stop has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
