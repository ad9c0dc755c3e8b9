//! Admission control for concurrently active jobs.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts active jobs against a fixed limit.
#[derive(Debug)]
pub struct JobSlots {
    /// Maximum number of concurrently active jobs.
    max_active: usize,
    /// Current number of active jobs.
    active_count: AtomicUsize,
}

impl JobSlots {
    /// Creates a slot pool with the given limit (at least one).
    pub fn new(max_active: usize) -> Self {
        Self {
            max_active: max_active.max(1),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Returns the configured limit.
    pub fn max_active(&self) -> usize {
        self.max_active
    }

    /// Returns the number of slots in use.
    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Returns true if every slot is taken.
    pub fn is_full(&self) -> bool {
        self.active_count() >= self.max_active
    }

    /// Takes a slot. Returns `false` without side effects when full.
    pub(crate) fn acquire(&self) -> bool {
        self.active_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_active).then_some(n + 1)
            })
            .is_ok()
    }

    /// Returns a slot.
    pub(crate) fn release(&self) {
        self.active_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok();
    }
}

impl Default for JobSlots {
    fn default() -> Self {
        Self::new(16)
    }
}
