//! Atomic counters tracking pool activity.

use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time snapshot of pool activity counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStatistics {
    /// Successful claims
    pub claims: u64,
    /// Bounded claims that timed out
    pub claim_timeouts: u64,
    /// Successful allocator invocations
    pub allocations: u64,
    /// Failed allocator invocations
    pub allocation_failures: u64,
    /// Objects handed to the allocator for destruction
    pub deallocations: u64,
    /// Objects found expired at claim time
    pub expirations: u64,
}

/// Collects pool activity counters.
#[derive(Debug, Default)]
pub struct StatisticsCollector {
    claims: AtomicU64,
    claim_timeouts: AtomicU64,
    allocations: AtomicU64,
    allocation_failures: AtomicU64,
    deallocations: AtomicU64,
    expirations: AtomicU64,
}

impl StatisticsCollector {
    /// Creates a collector with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_claim(&self) {
        self.claims.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_claim_timeout(&self) {
        self.claim_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_allocation(&self) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_allocation_failure(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_deallocation(&self) {
        self.deallocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of the current counter values.
    pub fn snapshot(&self) -> PoolStatistics {
        PoolStatistics {
            claims: self.claims.load(Ordering::Relaxed),
            claim_timeouts: self.claim_timeouts.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            deallocations: self.deallocations.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}
