//! Cancellation scopes for store operations.

use punnet_types::error::StoreError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheap, cloneable cancellation flag threaded through store operations.
///
/// Clones share the flag, so cancelling any clone cancels them all. An
/// already-cancelled scope causes in-flight operations to return
/// [`StoreError::Cancelled`] promptly. Cancellation does not roll back
/// mutations already applied to a cache; the caller discards the capability's
/// cache by closing it without flushing.
#[derive(Clone, Debug, Default)]
pub struct CancelScope {
    cancelled: Arc<AtomicBool>,
}

impl CancelScope {
    /// Creates a fresh, un-cancelled scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the scope and every clone sharing its flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True when the scope has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(StoreError::Cancelled)` when the scope is cancelled.
    pub fn check(&self) -> Result<(), StoreError> {
        if self.is_cancelled() {
            Err(StoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}
