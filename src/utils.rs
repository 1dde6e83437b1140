//! Timeout budget arithmetic and allocator invocation guards.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::error::AllocError;
use crate::slot::SlotHandle;
use crate::traits::{Allocator, Poolable};

/// A claim's wait budget, expressed as an absolute deadline.
///
/// The budget is consumed by waits: every call to [`Deadline::remaining`]
/// reports what is left of the original timeout, so successive waits on a
/// condition variable or channel each use only the unspent portion.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline `timeout` from now. Saturates to an unbounded deadline if
    /// the timeout is too large to represent as an `Instant`.
    pub(crate) fn bounded(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
        }
    }

    /// A deadline that never expires.
    pub(crate) fn unbounded() -> Self {
        Self { at: None }
    }

    pub(crate) fn is_bounded(&self) -> bool {
        self.at.is_some()
    }

    /// Remaining budget. `None` means unbounded; `Some(Duration::ZERO)`
    /// means the budget is spent.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

/// Absolute expiry deadline for an object allocated now.
///
/// Saturates to a deadline decades out if `now + ttl` is not representable.
pub(crate) fn expires_at(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365 * 30))
}

/// Invokes the allocator, converting a panic into an allocation failure.
///
/// Allocation runs on claim and helper threads; an unwinding allocator
/// must not leave a slot stuck mid-allocation or kill the allocator actor.
pub(crate) fn allocate_guarded<T: Poolable>(
    allocator: &dyn Allocator<T>,
    slot: SlotHandle<T>,
) -> core::result::Result<T, AllocError> {
    match catch_unwind(AssertUnwindSafe(|| allocator.allocate(slot))) {
        Ok(outcome) => outcome,
        Err(_) => Err("allocator panicked during allocate".into()),
    }
}

/// Invokes `deallocate`, swallowing errors and panics.
///
/// Deallocation failures are suppressed: they happen on claim, helper, and
/// drain threads whose callers cannot meaningfully react.
pub(crate) fn deallocate_guarded<T: Poolable>(allocator: &dyn Allocator<T>, object: T) {
    match catch_unwind(AssertUnwindSafe(|| allocator.deallocate(object))) {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::warn!(%error, "deallocation failed; error suppressed");
        }
        Err(_) => {
            tracing::warn!("allocator panicked during deallocate; error suppressed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_never_expires() {
        let deadline = Deadline::unbounded();
        assert!(!deadline.is_bounded());
        assert_eq!(deadline.remaining(), None);
    }

    #[test]
    fn bounded_budget_shrinks() {
        let deadline = Deadline::bounded(Duration::from_millis(200));
        let first = deadline.remaining().unwrap();
        assert!(first <= Duration::from_millis(200));

        std::thread::sleep(Duration::from_millis(20));
        let second = deadline.remaining().unwrap();
        assert!(second < first);
    }

    #[test]
    fn zero_budget_is_already_spent() {
        let deadline = Deadline::bounded(Duration::ZERO);
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn oversized_timeout_saturates_to_unbounded() {
        let deadline = Deadline::bounded(Duration::MAX);
        assert_eq!(deadline.remaining(), None);
    }

    #[test]
    fn expiry_is_ttl_from_now() {
        let now = Instant::now();
        assert_eq!(
            expires_at(now, Duration::from_secs(5)),
            now + Duration::from_secs(5)
        );
    }
}
