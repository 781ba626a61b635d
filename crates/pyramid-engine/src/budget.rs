//! External-merge call budget.
//!
//! One counter per build call, owned by the engine — never a process-wide
//! singleton, so concurrent builds (and tests) cannot cross-contaminate.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared counter guarding the external AI-merge call budget.
///
/// Once exhausted, clusters that would need an external merge are
/// force-assigned to edge tier with an explanatory flag instead of bypassing
/// the budget.
#[derive(Debug)]
pub struct MergeBudget {
    limit: Option<usize>,
    used: AtomicUsize,
}

impl MergeBudget {
    /// `limit = None` means unlimited.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    /// Reserve one external call. Returns false when the budget is spent;
    /// the reservation is atomic, so parallel canonicalization cannot
    /// overshoot the limit.
    pub fn try_acquire(&self) -> bool {
        match self.limit {
            None => {
                self.used.fetch_add(1, Ordering::SeqCst);
                true
            }
            Some(limit) => self
                .used
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                    (used < limit).then_some(used + 1)
                })
                .is_ok(),
        }
    }

    /// Calls made so far.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    /// The configured limit, if any.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}
