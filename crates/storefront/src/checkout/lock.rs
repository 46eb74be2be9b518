//! Single-holder submission lock.

use std::sync::atomic::{AtomicBool, Ordering};

/// Exclusive guard allowing at most one order submission in flight.
///
/// Acquisition is a single compare-and-swap and never suspends, so it can be
/// performed strictly before the first `.await` of a submission.
#[derive(Debug, Default)]
pub struct SubmissionLock {
    held: AtomicBool,
}

impl SubmissionLock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Take the lock, or `None` if a submission is already in flight.
    pub fn try_acquire(&self) -> Option<SubmissionGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmissionGuard { lock: self })
    }

    /// Whether a submission currently holds the lock.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Proof of holding the [`SubmissionLock`]. Releases it when dropped.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SubmissionGuard<'a> {
    lock: &'a SubmissionLock,
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
    }
}
