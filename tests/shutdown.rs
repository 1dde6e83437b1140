//! Shutdown and drain behavior against both pool variants.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{lock_pool, queue_pool, CountingAllocator, TestObject, LONG_TTL};
use slotpool::{Error, Pool, Poolable};

fn drain_waits_for_claimed_objects(pool: &dyn Pool<TestObject>, allocator: &CountingAllocator) {
    let held = pool.claim().unwrap();

    let completion = pool.shutdown();
    assert!(!completion.wait_timeout(Duration::from_millis(50)));

    held.release();
    completion.wait();
    assert!(completion.is_complete());
    assert_eq!(allocator.allocated(), allocator.deallocated());
    assert!(allocator.allocated() >= 1);
}

#[test]
fn lock_drain_waits_for_claimed_objects() {
    let allocator = CountingAllocator::new();
    let pool = lock_pool(2, LONG_TTL, Arc::clone(&allocator));
    drain_waits_for_claimed_objects(&pool, &allocator);
}

#[test]
fn queue_drain_waits_for_claimed_objects() {
    let allocator = CountingAllocator::new();
    let pool = queue_pool(2, LONG_TTL, Arc::clone(&allocator));
    drain_waits_for_claimed_objects(&pool, &allocator);
}

fn claims_fail_after_shutdown(pool: &dyn Pool<TestObject>) {
    pool.shutdown().wait();

    assert!(matches!(pool.claim(), Err(Error::ShutDown)));
    assert!(matches!(
        pool.claim_timeout(Duration::from_secs(5)),
        Err(Error::ShutDown)
    ));
}

#[test]
fn lock_claims_fail_after_shutdown() {
    let allocator = CountingAllocator::new();
    let pool = lock_pool(1, LONG_TTL, allocator);
    claims_fail_after_shutdown(&pool);
}

#[test]
fn queue_claims_fail_after_shutdown() {
    let allocator = CountingAllocator::new();
    let pool = queue_pool(1, LONG_TTL, allocator);
    claims_fail_after_shutdown(&pool);
}

fn shutdown_is_idempotent(pool: &dyn Pool<TestObject>) {
    let first = pool.shutdown();
    let second = pool.shutdown();

    first.wait();
    assert!(second.is_complete());
}

#[test]
fn lock_shutdown_is_idempotent() {
    let allocator = CountingAllocator::new();
    let pool = lock_pool(1, LONG_TTL, allocator);
    shutdown_is_idempotent(&pool);
}

#[test]
fn queue_shutdown_is_idempotent() {
    let allocator = CountingAllocator::new();
    let pool = queue_pool(1, LONG_TTL, allocator);
    shutdown_is_idempotent(&pool);
}

#[test]
fn lock_shutdown_unblocks_a_waiting_claimer() {
    let allocator = CountingAllocator::new();
    let pool = lock_pool(1, LONG_TTL, allocator);
    shutdown_unblocks_a_waiting_claimer(pool);
}

#[test]
fn queue_shutdown_unblocks_a_waiting_claimer() {
    let allocator = CountingAllocator::new();
    let pool = queue_pool(1, LONG_TTL, allocator);
    shutdown_unblocks_a_waiting_claimer(pool);
}

fn shutdown_unblocks_a_waiting_claimer<P>(pool: P)
where
    P: Pool<TestObject> + Clone + 'static,
{
    let held = pool.claim().unwrap();

    let blocked = {
        let pool = pool.clone();
        thread::spawn(move || pool.claim())
    };

    // give the claimer time to block on the exhausted pool
    thread::sleep(Duration::from_millis(50));
    let completion = pool.shutdown();

    let outcome = blocked.join().unwrap();
    assert!(matches!(outcome, Err(Error::ShutDown)));

    held.release();
    completion.wait();
}

#[test]
fn completion_clones_share_state() {
    let allocator = CountingAllocator::new();
    let pool = lock_pool(1, LONG_TTL, allocator);

    let completion = pool.shutdown();
    let observer = completion.clone();
    completion.wait();
    assert!(observer.is_complete());
}

#[test]
fn drain_deallocates_idle_objects_without_waiting() {
    let allocator = CountingAllocator::new();
    let pool = lock_pool(3, LONG_TTL, Arc::clone(&allocator));

    let a = pool.claim().unwrap();
    let b = pool.claim().unwrap();
    a.release();
    b.release();

    pool.shutdown().wait();
    assert_eq!(allocator.allocated(), 2);
    assert_eq!(allocator.deallocated(), 2);
}
