//! Visitor counter: a mutex-guarded, never-negative integer.
//!
//! The process-wide instance comes from [`VisitorCounter::global`]. Handlers
//! receive it through application state, so tests can use isolated
//! instances from [`VisitorCounter::new`].

use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

static VISITORS: OnceLock<Arc<VisitorCounter>> = OnceLock::new();

#[derive(Debug, Default)]
pub struct VisitorCounter {
    num: Mutex<u64>,
}

impl VisitorCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide counter. Initialized once, on first call.
    pub fn global() -> Arc<VisitorCounter> {
        Arc::clone(VISITORS.get_or_init(|| Arc::new(VisitorCounter::new())))
    }

    /// Add one visitor and return the new count.
    pub fn increment(&self) -> u64 {
        let mut num = self.lock();
        *num = num.saturating_add(1);
        *num
    }

    /// Remove one visitor and return the new count.
    ///
    /// Fails with [`Error::CounterUnderflow`] at zero, leaving the count
    /// untouched. The guard is released on every return path.
    pub fn decrement(&self) -> Result<u64> {
        let mut num = self.lock();
        if *num == 0 {
            return Err(Error::CounterUnderflow);
        }
        *num -= 1;
        Ok(*num)
    }

    pub fn count(&self) -> u64 {
        *self.lock()
    }

    // A panic while holding the lock cannot leave the integer half-written,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, u64> {
        self.num.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
