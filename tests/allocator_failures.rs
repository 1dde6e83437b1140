//! Allocator failure isolation against both pool variants.

mod common;

use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

use common::{lock_pool, queue_pool, CountingAllocator, TestObject, LONG_TTL};
use slotpool::{Error, Pool, Poolable};

fn failure_surfaces_and_pool_recovers(pool: &dyn Pool<TestObject>, allocator: &CountingAllocator) {
    let err = pool.claim().unwrap_err();
    match &err {
        Error::AllocationFailed { .. } => {}
        other => panic!("expected AllocationFailed, got {other:?}"),
    }
    let source = err.source().expect("the allocator's error should be attached");
    assert_eq!(source.to_string(), "allocator offline");

    // the allocator is healthy again; the next claim retries
    let object = pool.claim().unwrap();
    object.release();
    assert_eq!(allocator.allocated(), 1);
}

#[test]
fn lock_failure_surfaces_and_pool_recovers() {
    let allocator = CountingAllocator::new();
    allocator.fail_next(1);
    let pool = lock_pool(1, LONG_TTL, Arc::clone(&allocator));
    failure_surfaces_and_pool_recovers(&pool, &allocator);
}

#[test]
fn queue_failure_surfaces_and_pool_recovers() {
    let allocator = CountingAllocator::new();
    allocator.fail_next(1);
    let pool = queue_pool(1, LONG_TTL, Arc::clone(&allocator));
    failure_surfaces_and_pool_recovers(&pool, &allocator);
}

fn failure_does_not_leak_capacity(pool: &dyn Pool<TestObject>) {
    assert!(pool.claim().is_err());

    // full capacity must still be reachable afterwards
    let a = pool.claim().unwrap();
    let b = pool.claim().unwrap();
    assert_ne!(a.serial, b.serial);
    a.release();
    b.release();
}

#[test]
fn lock_failure_does_not_leak_capacity() {
    let allocator = CountingAllocator::new();
    allocator.fail_next(1);
    let pool = lock_pool(2, LONG_TTL, allocator);
    failure_does_not_leak_capacity(&pool);
}

#[test]
fn queue_failure_does_not_leak_capacity() {
    let allocator = CountingAllocator::new();
    allocator.fail_next(1);
    let pool = queue_pool(2, LONG_TTL, allocator);
    failure_does_not_leak_capacity(&pool);
}

#[test]
fn lock_bounded_claim_surfaces_allocation_failure() {
    let allocator = CountingAllocator::new();
    allocator.fail_next(1);
    let pool = lock_pool(1, LONG_TTL, Arc::clone(&allocator));

    let err = pool.claim_timeout(Duration::from_secs(5)).unwrap_err();
    assert!(matches!(err, Error::AllocationFailed { .. }));

    let object = pool.claim_timeout(Duration::from_secs(5)).unwrap().unwrap();
    object.release();
}

#[test]
fn shutdown_succeeds_after_allocator_failures() {
    let allocator = CountingAllocator::new();
    allocator.fail_next(1);
    let pool = lock_pool(1, LONG_TTL, Arc::clone(&allocator));

    assert!(pool.claim().is_err());
    let object = pool.claim().unwrap();
    object.release();

    pool.shutdown().wait();
    assert_eq!(allocator.allocated(), allocator.deallocated());
}
