//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use slotpool::{
    AllocError, Allocator, LockPool, PoolConfig, Poolable, QueuePool, SlotHandle,
};

/// A pooled object carrying a serial number so tests can tell allocations
/// apart.
pub struct TestObject {
    slot: SlotHandle<TestObject>,
    pub serial: u64,
}

impl Poolable for TestObject {
    fn slot(&self) -> &SlotHandle<Self> {
        &self.slot
    }
}

impl TestObject {
    /// Builds a detached object bound to an arbitrary handle, for
    /// stray-release scenarios.
    pub fn with_slot(slot: SlotHandle<TestObject>, serial: u64) -> Self {
        Self { slot, serial }
    }
}

impl std::fmt::Debug for TestObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestObject")
            .field("serial", &self.serial)
            .finish()
    }
}

/// Counts allocator activity and can be told to fail upcoming allocations.
#[derive(Default)]
pub struct CountingAllocator {
    allocated: AtomicU64,
    deallocated: AtomicU64,
    failures_remaining: AtomicU64,
}

impl CountingAllocator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next `count` allocations fail.
    pub fn fail_next(&self, count: u64) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::SeqCst)
    }

    pub fn deallocated(&self) -> u64 {
        self.deallocated.load(Ordering::SeqCst)
    }

    /// Objects currently live: allocated and not yet deallocated.
    pub fn live(&self) -> u64 {
        self.allocated() - self.deallocated()
    }
}

impl Allocator<TestObject> for CountingAllocator {
    fn allocate(&self, slot: SlotHandle<TestObject>) -> Result<TestObject, AllocError> {
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err("allocator offline".into());
        }
        let serial = self.allocated.fetch_add(1, Ordering::SeqCst);
        Ok(TestObject { slot, serial })
    }

    fn deallocate(&self, object: TestObject) -> Result<(), AllocError> {
        self.deallocated.fetch_add(1, Ordering::SeqCst);
        drop(object);
        Ok(())
    }
}

pub fn lock_pool(
    size: usize,
    ttl: Duration,
    allocator: Arc<CountingAllocator>,
) -> LockPool<TestObject> {
    let config = PoolConfig::builder()
        .size(size)
        .ttl(ttl)
        .allocator(allocator)
        .build()
        .unwrap();
    LockPool::new(config)
}

pub fn queue_pool(
    size: usize,
    ttl: Duration,
    allocator: Arc<CountingAllocator>,
) -> QueuePool<TestObject> {
    let config = PoolConfig::builder()
        .size(size)
        .ttl(ttl)
        .allocator(allocator)
        .build()
        .unwrap();
    QueuePool::new(config)
}

/// A TTL long enough that nothing expires during a test.
pub const LONG_TTL: Duration = Duration::from_secs(600);
