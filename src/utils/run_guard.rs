//! Non-blocking single-slot guard to prevent overlapping executions

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Compare-and-swap flag owned by the entity it protects.
///
/// Losing the race is not an error to wait on: callers treat a failed
/// `acquire` as "already running" and return immediately.
#[derive(Debug, Default)]
pub struct RunGuard {
    held: AtomicBool,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard if it is free. Returns false if already held.
    pub fn acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Reset the guard. Idempotent.
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    /// Snapshot of the current value, not a lock
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Acquire and return a lease that releases on drop (including unwinding)
    pub fn try_lease(&self) -> Option<RunLease<'_>> {
        if self.acquire() {
            Some(RunLease { guard: self })
        } else {
            None
        }
    }
}

/// Releases its guard when dropped
#[derive(Debug)]
pub struct RunLease<'a> {
    guard: &'a RunGuard,
}

impl<'a> RunLease<'a> {
    /// Take ownership of a guard that was already acquired with
    /// [`RunGuard::acquire`], so that it is released on every exit path.
    pub fn adopt(guard: &'a RunGuard) -> Self {
        debug_assert!(guard.is_held(), "adopting a guard that is not held");
        Self { guard }
    }
}

impl Drop for RunLease<'_> {
    fn drop(&mut self) {
        debug!("Releasing run guard");
        self.guard.release();
    }
}
