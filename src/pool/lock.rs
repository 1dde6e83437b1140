//! Reference pool variant built on a mutex and a condition variable.

use std::mem;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::completion::Completion;
use crate::config::PoolConfig;
use crate::error::{AllocError, Error, Result};
use crate::slot::{SlotBackend, SlotHandle};
use crate::traits::{Allocator, Pool, Poolable};
use crate::utils::{self, Deadline};

#[cfg(feature = "stats")]
use crate::stats::{PoolStatistics, StatisticsCollector};

/// The reference pool variant: a fixed slot array guarded by one mutex,
/// with a condition variable carrying release signals.
///
/// Slots are allocated lazily, in index order, on the first claim that
/// selects them. Unbounded claims run the allocator synchronously on the
/// claiming thread; bounded claims offload it to a one-shot helper thread
/// so the timeout also bounds the allocator call.
///
/// The pool is cheap to clone; clones share the same slots.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use slotpool::{AllocError, Allocator, LockPool, PoolConfig, Poolable, SlotHandle};
///
/// struct Session { slot: SlotHandle<Session> }
/// impl Poolable for Session {
///     fn slot(&self) -> &SlotHandle<Self> { &self.slot }
/// }
///
/// struct SessionAllocator;
/// impl Allocator<Session> for SessionAllocator {
///     fn allocate(&self, slot: SlotHandle<Session>) -> Result<Session, AllocError> {
///         Ok(Session { slot })
///     }
/// }
///
/// let config = PoolConfig::builder()
///     .size(2)
///     .ttl(Duration::from_secs(600))
///     .allocator(SessionAllocator)
///     .build()
///     .unwrap();
/// let pool = LockPool::new(config);
///
/// let session = pool.claim().unwrap();
/// session.release();
/// pool.shutdown().wait();
/// ```
///
/// Dropping the pool without calling `shutdown` drops any idle objects
/// without invoking the allocator's `deallocate`.
pub struct LockPool<T: Poolable> {
    core: Arc<LockCore<T>>,
}

struct LockCore<T: Poolable> {
    state: Mutex<PoolState<T>>,
    /// Carries release, install, and shutdown signals; always broadcast.
    signal: Condvar,
    ttl: Duration,
    allocator: Arc<dyn Allocator<T>>,
    #[cfg(feature = "stats")]
    stats: StatisticsCollector,
}

struct PoolState<T> {
    slots: Box<[Slot<T>]>,
    shut_down: bool,
    completion: Option<Completion>,
}

struct Slot<T> {
    state: SlotState<T>,
    /// Bumped every time an allocation begins; release checks it so a
    /// stale handle cannot touch a reallocated slot.
    epoch: u64,
}

enum SlotState<T> {
    /// No live allocation.
    Empty,
    /// The allocator is running for this slot.
    Allocating { abandoned: bool },
    /// Installed by a helper for the bounded claimer that requested it.
    Ready { object: T, expires_at: Instant },
    /// Live and unclaimed.
    Idle { object: T, expires_at: Instant },
    /// Live; the object is out with a claimer.
    Claimed { expires_at: Instant },
    /// A captured allocator failure, surfaced to the next claimer.
    Poisoned { source: AllocError },
}

impl<T> Slot<T> {
    fn take_state(&mut self) -> SlotState<T> {
        mem::replace(&mut self.state, SlotState::Empty)
    }

    fn begin_allocation(&mut self) -> u64 {
        self.epoch += 1;
        self.state = SlotState::Allocating { abandoned: false };
        self.epoch
    }

    fn mark_abandoned(&mut self) {
        if let SlotState::Allocating { abandoned } = &mut self.state {
            *abandoned = true;
        }
    }

    fn is_claimable(&self) -> bool {
        matches!(
            self.state,
            SlotState::Empty | SlotState::Idle { .. } | SlotState::Poisoned { .. }
        )
    }
}

fn find_claimable<T>(slots: &[Slot<T>]) -> Option<usize> {
    slots.iter().position(Slot::is_claimable)
}

impl<T: Poolable> LockPool<T> {
    /// Creates a pool from a validated configuration.
    pub fn new(config: PoolConfig<T>) -> Self {
        let size = config.size();
        let slots = (0..size)
            .map(|_| Slot {
                state: SlotState::Empty,
                epoch: 0,
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        tracing::debug!(size, ttl = ?config.ttl(), "lock pool created");
        Self {
            core: Arc::new(LockCore {
                state: Mutex::new(PoolState {
                    slots,
                    shut_down: false,
                    completion: None,
                }),
                signal: Condvar::new(),
                ttl: config.ttl(),
                allocator: config.allocator(),
                #[cfg(feature = "stats")]
                stats: StatisticsCollector::new(),
            }),
        }
    }

    /// Returns the fixed number of slots in this pool.
    #[inline]
    pub fn size(&self) -> usize {
        self.core.state.lock().slots.len()
    }

    /// Claims an object, blocking until one is available.
    ///
    /// See [`Pool::claim`] for the contract.
    pub fn claim(&self) -> Result<T> {
        let core = &self.core;
        let mut state = core.state.lock();
        loop {
            if state.shut_down {
                return Err(Error::ShutDown);
            }
            let Some(index) = find_claimable(&state.slots) else {
                core.signal.wait(&mut state);
                continue;
            };
            let slot = &mut state.slots[index];
            match slot.take_state() {
                SlotState::Idle { object, expires_at } if Instant::now() <= expires_at => {
                    slot.state = SlotState::Claimed { expires_at };
                    #[cfg(feature = "stats")]
                    core.stats.record_claim();
                    return Ok(object);
                }
                SlotState::Idle { object, .. } => {
                    #[cfg(feature = "stats")]
                    core.stats.record_expiration();
                    let epoch = slot.begin_allocation();
                    drop(state);
                    return self.allocate_on_claimer(index, epoch, Some(object));
                }
                SlotState::Empty => {
                    let epoch = slot.begin_allocation();
                    drop(state);
                    return self.allocate_on_claimer(index, epoch, None);
                }
                SlotState::Poisoned { source } => {
                    return Err(Error::AllocationFailed { source });
                }
                other => {
                    // raced with another claimer; rescan
                    slot.state = other;
                }
            }
        }
    }

    /// Claims an object, waiting at most `timeout`.
    ///
    /// See [`Pool::claim_timeout`] for the contract.
    pub fn claim_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        let core = &self.core;
        let deadline = Deadline::bounded(timeout);
        let mut state = core.state.lock();
        loop {
            if state.shut_down {
                return Err(Error::ShutDown);
            }
            let Some(index) = find_claimable(&state.slots) else {
                match deadline.remaining() {
                    Some(remaining) if !remaining.is_zero() => {
                        let _ = core.signal.wait_for(&mut state, remaining);
                    }
                    Some(_) => {
                        #[cfg(feature = "stats")]
                        core.stats.record_claim_timeout();
                        return Ok(None);
                    }
                    None => {
                        core.signal.wait(&mut state);
                    }
                }
                continue;
            };
            let slot = &mut state.slots[index];
            match slot.take_state() {
                SlotState::Idle { object, expires_at } if Instant::now() <= expires_at => {
                    slot.state = SlotState::Claimed { expires_at };
                    #[cfg(feature = "stats")]
                    core.stats.record_claim();
                    return Ok(Some(object));
                }
                SlotState::Idle { object, .. } => {
                    #[cfg(feature = "stats")]
                    core.stats.record_expiration();
                    let epoch = slot.begin_allocation();
                    if let Some(outcome) =
                        self.allocate_on_helper(&mut state, index, epoch, Some(object), deadline)
                    {
                        return outcome;
                    }
                }
                SlotState::Empty => {
                    let epoch = slot.begin_allocation();
                    if let Some(outcome) =
                        self.allocate_on_helper(&mut state, index, epoch, None, deadline)
                    {
                        return outcome;
                    }
                }
                SlotState::Poisoned { source } => {
                    return Err(Error::AllocationFailed { source });
                }
                other => {
                    slot.state = other;
                }
            }
        }
    }

    /// Shuts the pool down and starts an asynchronous drain.
    ///
    /// See [`Pool::shutdown`] for the contract.
    ///
    /// # Panics
    ///
    /// Panics if the drain thread cannot be spawned.
    pub fn shutdown(&self) -> Completion {
        let core = &self.core;
        let mut state = core.state.lock();
        if let Some(completion) = &state.completion {
            return completion.clone();
        }
        let completion = Completion::new();
        state.shut_down = true;
        state.completion = Some(completion.clone());
        core.signal.notify_all();
        drop(state);

        tracing::debug!("lock pool shutting down");
        let drain_core = Arc::clone(core);
        let drained = completion.clone();
        thread::Builder::new()
            .name("slotpool-drain".into())
            .spawn(move || drain_core.drain(drained))
            .expect("failed to spawn slotpool-drain thread");
        completion
    }

    /// Returns a snapshot of this pool's activity counters.
    #[cfg(feature = "stats")]
    #[cfg_attr(docsrs, doc(cfg(feature = "stats")))]
    pub fn statistics(&self) -> PoolStatistics {
        self.core.stats.snapshot()
    }

    /// Synchronous allocation path for unbounded claims. The slot is in
    /// `Allocating` and the lock is not held while the allocator runs.
    fn allocate_on_claimer(&self, index: usize, epoch: u64, expired: Option<T>) -> Result<T> {
        let core = &self.core;
        if let Some(old) = expired {
            core.discard(old);
        }
        let handle = core.slot_handle(index, epoch);
        let outcome = utils::allocate_guarded(&*core.allocator, handle);

        let mut state = core.state.lock();
        let shut_down = state.shut_down;
        let slot = &mut state.slots[index];
        debug_assert_eq!(slot.epoch, epoch);
        match outcome {
            Ok(object) => {
                #[cfg(feature = "stats")]
                core.stats.record_allocation();
                let expires_at = utils::expires_at(Instant::now(), core.ttl);
                if shut_down {
                    // too late to hand the object out; park it for the drain
                    slot.state = SlotState::Idle { object, expires_at };
                    core.signal.notify_all();
                    return Err(Error::ShutDown);
                }
                slot.state = SlotState::Claimed { expires_at };
                #[cfg(feature = "stats")]
                core.stats.record_claim();
                Ok(object)
            }
            Err(source) => {
                #[cfg(feature = "stats")]
                core.stats.record_allocation_failure();
                slot.state = SlotState::Empty;
                core.signal.notify_all();
                Err(Error::AllocationFailed { source })
            }
        }
    }

    /// Helper-thread allocation path for bounded claims. Returns `None`
    /// when the slot was resolved by someone else and the scan must start
    /// over.
    fn allocate_on_helper(
        &self,
        state: &mut MutexGuard<'_, PoolState<T>>,
        index: usize,
        epoch: u64,
        expired: Option<T>,
        deadline: Deadline,
    ) -> Option<Result<Option<T>>> {
        let core = &self.core;
        let helper_core = Arc::clone(core);
        let spawned = thread::Builder::new()
            .name("slotpool-alloc".into())
            .spawn(move || helper_core.run_allocation(index, epoch, expired));
        if let Err(error) = spawned {
            #[cfg(feature = "stats")]
            core.stats.record_allocation_failure();
            state.slots[index].state = SlotState::Empty;
            core.signal.notify_all();
            return Some(Err(Error::AllocationFailed {
                source: Box::new(error),
            }));
        }

        loop {
            if state.shut_down {
                let slot = &mut state.slots[index];
                if slot.epoch == epoch {
                    match slot.take_state() {
                        SlotState::Ready { object, expires_at } => {
                            slot.state = SlotState::Idle { object, expires_at };
                            core.signal.notify_all();
                        }
                        SlotState::Allocating { .. } => {
                            slot.state = SlotState::Allocating { abandoned: true };
                        }
                        other => slot.state = other,
                    }
                }
                return Some(Err(Error::ShutDown));
            }

            let slot = &mut state.slots[index];
            if slot.epoch != epoch {
                return None;
            }
            match slot.take_state() {
                SlotState::Ready { object, expires_at } => {
                    slot.state = SlotState::Claimed { expires_at };
                    #[cfg(feature = "stats")]
                    core.stats.record_claim();
                    return Some(Ok(Some(object)));
                }
                SlotState::Poisoned { source } => {
                    return Some(Err(Error::AllocationFailed { source }));
                }
                pending @ SlotState::Allocating { .. } => {
                    slot.state = pending;
                }
                other => {
                    slot.state = other;
                    return None;
                }
            }

            match deadline.remaining() {
                Some(remaining) if !remaining.is_zero() => {
                    let _ = core.signal.wait_for(state, remaining);
                }
                Some(_) => {
                    // budget spent; let the allocation finish in the background
                    state.slots[index].mark_abandoned();
                    #[cfg(feature = "stats")]
                    core.stats.record_claim_timeout();
                    tracing::trace!(index, "claim timed out while allocating");
                    return Some(Ok(None));
                }
                None => {
                    core.signal.wait(state);
                }
            }
        }
    }
}

impl<T: Poolable> LockCore<T> {
    fn slot_handle(self: &Arc<Self>, index: usize, epoch: u64) -> SlotHandle<T> {
        let backend_arc: Arc<dyn SlotBackend<T>> = self.clone();
        let backend: Weak<dyn SlotBackend<T>> = Arc::downgrade(&backend_arc);
        SlotHandle::new(backend, index, epoch)
    }

    /// Body of the one-shot helper thread spawned for a bounded claim.
    fn run_allocation(self: Arc<Self>, index: usize, epoch: u64, expired: Option<T>) {
        if let Some(old) = expired {
            self.discard(old);
        }
        let handle = self.slot_handle(index, epoch);
        let outcome = utils::allocate_guarded(&*self.allocator, handle);

        let mut state = self.state.lock();
        let slot = &mut state.slots[index];
        debug_assert_eq!(slot.epoch, epoch);
        match outcome {
            Ok(object) => {
                #[cfg(feature = "stats")]
                self.stats.record_allocation();
                let expires_at = utils::expires_at(Instant::now(), self.ttl);
                if matches!(slot.state, SlotState::Allocating { abandoned: true }) {
                    tracing::trace!(index, "allocation outlived its claim; parking object");
                    slot.state = SlotState::Idle { object, expires_at };
                } else {
                    slot.state = SlotState::Ready { object, expires_at };
                }
            }
            Err(source) => {
                #[cfg(feature = "stats")]
                self.stats.record_allocation_failure();
                slot.state = SlotState::Poisoned { source };
            }
        }
        self.signal.notify_all();
    }

    /// Body of the drain thread. Walks the slots in index order, waiting
    /// (uninterruptibly) for claimed and in-flight slots to settle, then
    /// deallocates what they held.
    fn drain(self: Arc<Self>, completion: Completion) {
        let size = self.state.lock().slots.len();
        for index in 0..size {
            let object = {
                let mut state = self.state.lock();
                loop {
                    match state.slots[index].state {
                        SlotState::Claimed { .. }
                        | SlotState::Allocating { .. }
                        | SlotState::Ready { .. } => {
                            self.signal.wait(&mut state);
                        }
                        _ => break,
                    }
                }
                match state.slots[index].take_state() {
                    SlotState::Idle { object, .. } => Some(object),
                    _ => None,
                }
            };
            if let Some(object) = object {
                self.discard(object);
            }
        }
        completion.complete();
        tracing::debug!("lock pool drained");
    }

    fn discard(&self, object: T) {
        #[cfg(feature = "stats")]
        self.stats.record_deallocation();
        utils::deallocate_guarded(&*self.allocator, object);
    }
}

impl<T: Poolable> SlotBackend<T> for LockCore<T> {
    fn release(&self, index: usize, epoch: u64, object: T) {
        let mut state = self.state.lock();
        if let Some(slot) = state.slots.get_mut(index) {
            if slot.epoch == epoch {
                if let SlotState::Claimed { expires_at } = slot.state {
                    slot.state = SlotState::Idle { object, expires_at };
                    self.signal.notify_all();
                    return;
                }
            }
        }
        drop(state);
        tracing::debug!(index, "stray release ignored");
    }
}

impl<T: Poolable> Pool<T> for LockPool<T> {
    fn claim(&self) -> Result<T> {
        LockPool::claim(self)
    }

    fn claim_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        LockPool::claim_timeout(self, timeout)
    }

    fn shutdown(&self) -> Completion {
        LockPool::shutdown(self)
    }
}

impl<T: Poolable> Clone for LockPool<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Widget {
        slot: SlotHandle<Widget>,
        serial: u64,
    }

    impl Poolable for Widget {
        fn slot(&self) -> &SlotHandle<Self> {
            &self.slot
        }
    }

    #[derive(Default)]
    struct WidgetAllocator {
        allocated: AtomicU64,
        deallocated: AtomicU64,
    }

    impl Allocator<Widget> for WidgetAllocator {
        fn allocate(&self, slot: SlotHandle<Widget>) -> core::result::Result<Widget, AllocError> {
            let serial = self.allocated.fetch_add(1, Ordering::SeqCst);
            Ok(Widget { slot, serial })
        }

        fn deallocate(&self, object: Widget) -> core::result::Result<(), AllocError> {
            self.deallocated.fetch_add(1, Ordering::SeqCst);
            drop(object);
            Ok(())
        }
    }

    fn pool_of(size: usize, ttl: Duration, allocator: Arc<WidgetAllocator>) -> LockPool<Widget> {
        let config = PoolConfig::builder()
            .size(size)
            .ttl(ttl)
            .allocator(allocator)
            .build()
            .unwrap();
        LockPool::new(config)
    }

    #[test]
    fn claim_release_claim_reuses_the_object() {
        let allocator = Arc::new(WidgetAllocator::default());
        let pool = pool_of(1, Duration::from_secs(600), Arc::clone(&allocator));

        let first = pool.claim().unwrap();
        let serial = first.serial;
        first.release();

        let second = pool.claim().unwrap();
        assert_eq!(second.serial, serial);
        assert_eq!(allocator.allocated.load(Ordering::SeqCst), 1);
        second.release();
    }

    #[test]
    fn stray_release_through_a_cloned_handle_is_ignored() {
        let allocator = Arc::new(WidgetAllocator::default());
        let pool = pool_of(1, Duration::from_secs(600), Arc::clone(&allocator));

        let object = pool.claim().unwrap();
        let stale = object.slot().clone();
        let serial = object.serial;
        object.release();

        // the slot is idle, not claimed; this release must change nothing
        stale.release(Widget {
            slot: stale.clone(),
            serial: 999,
        });

        let again = pool.claim().unwrap();
        assert_eq!(again.serial, serial);
        again.release();
    }

    #[test]
    fn expired_object_is_replaced_on_claim() {
        let allocator = Arc::new(WidgetAllocator::default());
        let pool = pool_of(1, Duration::from_millis(1), Arc::clone(&allocator));

        let first = pool.claim().unwrap();
        let first_serial = first.serial;
        thread::sleep(Duration::from_millis(10));
        first.release();

        let second = pool.claim().unwrap();
        assert_ne!(second.serial, first_serial);
        assert_eq!(allocator.deallocated.load(Ordering::SeqCst), 1);
        second.release();
    }

    #[test]
    fn zero_timeout_does_not_wait() {
        let allocator = Arc::new(WidgetAllocator::default());
        let pool = pool_of(1, Duration::from_secs(600), Arc::clone(&allocator));

        let held = pool.claim().unwrap();
        let outcome = pool.claim_timeout(Duration::ZERO).unwrap();
        assert!(outcome.is_none());
        held.release();
    }
}
