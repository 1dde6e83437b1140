//! Queue pool variant fed by a background allocator actor.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::completion::Completion;
use crate::config::PoolConfig;
use crate::error::{AllocError, Error, Result};
use crate::slot::{SlotBackend, SlotHandle};
use crate::traits::{Allocator, Pool, Poolable};
use crate::utils::{self, Deadline};

#[cfg(feature = "stats")]
use crate::stats::{PoolStatistics, StatisticsCollector};

/// The queue pool variant: claims poll a bounded live queue that a
/// background allocator actor keeps fed.
///
/// The actor eagerly allocates one object per slot at startup, so the
/// first claims do not pay allocation latency. Claims take entries off the
/// queue FIFO; releases hand objects back to the actor, which re-offers
/// them. Expired entries are handed to the actor for refresh instead of
/// being re-enqueued. At shutdown a sentinel entry propagates
/// [`Error::ShutDown`] to every blocked claimer.
///
/// There is no central mutex on the claim path; contention is on the
/// channel only.
///
/// The pool is cheap to clone; clones share the same queue.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use slotpool::{AllocError, Allocator, PoolConfig, Poolable, QueuePool, SlotHandle};
///
/// struct Decoder { slot: SlotHandle<Decoder> }
/// impl Poolable for Decoder {
///     fn slot(&self) -> &SlotHandle<Self> { &self.slot }
/// }
///
/// struct DecoderAllocator;
/// impl Allocator<Decoder> for DecoderAllocator {
///     fn allocate(&self, slot: SlotHandle<Decoder>) -> Result<Decoder, AllocError> {
///         Ok(Decoder { slot })
///     }
/// }
///
/// let config = PoolConfig::builder()
///     .size(4)
///     .ttl(Duration::from_secs(60))
///     .allocator(DecoderAllocator)
///     .build()
///     .unwrap();
/// let pool = QueuePool::new(config);
///
/// let decoder = pool.claim().unwrap();
/// decoder.release();
/// pool.shutdown().wait();
/// ```
///
/// Dropping the pool without calling `shutdown` stops the actor, which
/// deallocates whatever is still queued; objects out with claimers are
/// dropped on release without reaching the allocator.
pub struct QueuePool<T: Poolable> {
    core: Arc<QueueCore<T>>,
}

struct QueueCore<T: Poolable> {
    live_tx: Sender<Entry<T>>,
    live_rx: Receiver<Entry<T>>,
    requests: Sender<Request<T>>,
    shut_down: AtomicBool,
    /// One claim guard per slot; release CASes it back to false.
    claimed: Box<[AtomicBool]>,
    /// Allocation epoch per slot, bumped by the actor on every provision;
    /// release rejects handles carrying a stale epoch.
    epochs: Box<[AtomicU64]>,
    completion: Mutex<Option<Completion>>,
    #[cfg(feature = "stats")]
    stats: Arc<StatisticsCollector>,
}

/// What claimers take off the live queue.
enum Entry<T> {
    Live {
        index: usize,
        object: T,
        expires_at: Instant,
    },
    Poisoned {
        index: usize,
        source: AllocError,
    },
    /// Shutdown sentinel; each claimer that pops it pushes it back.
    ShutDown,
}

/// What the allocator actor consumes.
enum Request<T> {
    Release { index: usize, object: T },
    Refresh { index: usize, object: Option<T> },
    ShutDown { completion: Completion },
}

impl<T: Poolable> QueuePool<T> {
    /// Creates a pool from a validated configuration and starts its
    /// allocator actor.
    ///
    /// # Panics
    ///
    /// Panics if the allocator actor thread cannot be spawned.
    pub fn new(config: PoolConfig<T>) -> Self {
        let size = config.size();
        // size live entries plus at most one shutdown sentinel
        let (live_tx, live_rx) = bounded(size + 1);
        let (req_tx, req_rx) = unbounded();

        #[cfg(feature = "stats")]
        let stats = Arc::new(StatisticsCollector::new());

        let core = Arc::new(QueueCore {
            live_tx: live_tx.clone(),
            live_rx: live_rx.clone(),
            requests: req_tx,
            shut_down: AtomicBool::new(false),
            claimed: (0..size)
                .map(|_| AtomicBool::new(false))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            epochs: (0..size)
                .map(|_| AtomicU64::new(0))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            completion: Mutex::new(None),
            #[cfg(feature = "stats")]
            stats: Arc::clone(&stats),
        });

        let actor = AllocatorActor {
            allocator: config.allocator(),
            ttl: config.ttl(),
            core: Arc::downgrade(&core),
            live_tx,
            live_rx,
            requests: req_rx,
            expires: vec![Instant::now(); size],
            outstanding: 0,
            draining: false,
            completion: None,
            #[cfg(feature = "stats")]
            stats,
        };
        thread::Builder::new()
            .name("slotpool-allocator".into())
            .spawn(move || actor.run(size))
            .expect("failed to spawn slotpool-allocator thread");

        tracing::debug!(size, ttl = ?config.ttl(), "queue pool created");
        Self { core }
    }

    /// Returns the fixed number of slots in this pool.
    #[inline]
    pub fn size(&self) -> usize {
        self.core.claimed.len()
    }

    /// Claims an object, blocking until one is available.
    ///
    /// See [`Pool::claim`] for the contract.
    pub fn claim(&self) -> Result<T> {
        loop {
            if let Some(object) = self.claim_inner(Deadline::unbounded())? {
                return Ok(object);
            }
        }
    }

    /// Claims an object, waiting at most `timeout`.
    ///
    /// See [`Pool::claim_timeout`] for the contract.
    pub fn claim_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        self.claim_inner(Deadline::bounded(timeout))
    }

    /// Shuts the pool down and starts draining on the allocator actor.
    ///
    /// See [`Pool::shutdown`] for the contract.
    pub fn shutdown(&self) -> Completion {
        let core = &self.core;
        let mut guard = core.completion.lock();
        if let Some(completion) = &*guard {
            return completion.clone();
        }
        let completion = Completion::new();
        *guard = Some(completion.clone());
        core.shut_down.store(true, Ordering::Release);
        drop(guard);

        tracing::debug!("queue pool shutting down");
        let request = Request::ShutDown {
            completion: completion.clone(),
        };
        if core.requests.send(request).is_err() {
            // the actor is already gone; there is nothing left to drain
            completion.complete();
        }
        completion
    }

    /// Returns a snapshot of this pool's activity counters.
    #[cfg(feature = "stats")]
    #[cfg_attr(docsrs, doc(cfg(feature = "stats")))]
    pub fn statistics(&self) -> PoolStatistics {
        self.core.stats.snapshot()
    }

    fn claim_inner(&self, deadline: Deadline) -> Result<Option<T>> {
        let core = &self.core;
        loop {
            if core.shut_down.load(Ordering::Acquire) {
                return Err(Error::ShutDown);
            }
            let entry = match deadline.remaining() {
                None => match core.live_rx.recv() {
                    Ok(entry) => entry,
                    Err(_) => return Err(Error::ShutDown),
                },
                Some(remaining) if remaining.is_zero() => match core.live_rx.try_recv() {
                    Ok(entry) => entry,
                    Err(TryRecvError::Empty) => {
                        #[cfg(feature = "stats")]
                        core.stats.record_claim_timeout();
                        return Ok(None);
                    }
                    Err(TryRecvError::Disconnected) => return Err(Error::ShutDown),
                },
                Some(remaining) => match core.live_rx.recv_timeout(remaining) {
                    Ok(entry) => entry,
                    Err(RecvTimeoutError::Timeout) => {
                        #[cfg(feature = "stats")]
                        core.stats.record_claim_timeout();
                        return Ok(None);
                    }
                    Err(RecvTimeoutError::Disconnected) => return Err(Error::ShutDown),
                },
            };
            match entry {
                Entry::Live {
                    index,
                    object,
                    expires_at,
                } => {
                    if Instant::now() > expires_at {
                        #[cfg(feature = "stats")]
                        core.stats.record_expiration();
                        tracing::trace!(index, "expired entry sent back for refresh");
                        let _ = core.requests.send(Request::Refresh {
                            index,
                            object: Some(object),
                        });
                        continue;
                    }
                    core.claimed[index].store(true, Ordering::Release);
                    #[cfg(feature = "stats")]
                    core.stats.record_claim();
                    return Ok(Some(object));
                }
                Entry::Poisoned { index, source } => {
                    let _ = core.requests.send(Request::Refresh {
                        index,
                        object: None,
                    });
                    return Err(Error::AllocationFailed { source });
                }
                Entry::ShutDown => {
                    // pass the sentinel on to the next blocked claimer
                    let _ = core.live_tx.send(Entry::ShutDown);
                    return Err(Error::ShutDown);
                }
            }
        }
    }
}

impl<T: Poolable> SlotBackend<T> for QueueCore<T> {
    fn release(&self, index: usize, epoch: u64, object: T) {
        let Some(flag) = self.claimed.get(index) else {
            return;
        };
        let Some(slot_epoch) = self.epochs.get(index) else {
            return;
        };
        if slot_epoch.load(Ordering::Acquire) == epoch && flag.swap(false, Ordering::AcqRel) {
            if self.requests.send(Request::Release { index, object }).is_err() {
                tracing::debug!(index, "release after allocator actor exit; object discarded");
            }
        } else {
            tracing::debug!(index, "stray release ignored");
        }
    }
}

impl<T: Poolable> Pool<T> for QueuePool<T> {
    fn claim(&self) -> Result<T> {
        QueuePool::claim(self)
    }

    fn claim_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        QueuePool::claim_timeout(self, timeout)
    }

    fn shutdown(&self) -> Completion {
        QueuePool::shutdown(self)
    }
}

impl<T: Poolable> Clone for QueuePool<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

/// The background actor owning all allocation and deallocation for a
/// [`QueuePool`].
struct AllocatorActor<T: Poolable> {
    allocator: Arc<dyn Allocator<T>>,
    ttl: Duration,
    /// Weak so dropping every pool handle disconnects the actor. Upgraded
    /// to bump slot epochs and coerced into the handles it mints.
    core: Weak<QueueCore<T>>,
    live_tx: Sender<Entry<T>>,
    live_rx: Receiver<Entry<T>>,
    requests: Receiver<Request<T>>,
    /// Expiry deadlines by slot; a released object keeps its original one.
    expires: Vec<Instant>,
    /// Live objects currently allocated; the drain completes at zero.
    outstanding: usize,
    draining: bool,
    completion: Option<Completion>,
    #[cfg(feature = "stats")]
    stats: Arc<StatisticsCollector>,
}

impl<T: Poolable> AllocatorActor<T> {
    fn run(mut self, size: usize) {
        tracing::debug!(size, "allocator actor started");
        for index in 0..size {
            self.provision(index);
        }
        loop {
            match self.requests.recv() {
                Ok(Request::Release { index, object }) => self.handle_release(index, object),
                Ok(Request::Refresh { index, object }) => self.handle_refresh(index, object),
                Ok(Request::ShutDown { completion }) => self.begin_drain(completion),
                Err(_) => {
                    // every pool handle is gone; discard what is still queued
                    self.sweep_live();
                    return;
                }
            }
            if self.draining && self.outstanding == 0 {
                if let Some(completion) = self.completion.take() {
                    completion.complete();
                }
                tracing::debug!("queue pool drained");
                return;
            }
        }
    }

    /// Allocates a fresh object for `index` and offers it to the live
    /// queue; failures are offered as poisoned entries so a waiting
    /// claimer surfaces them promptly.
    fn provision(&mut self, index: usize) {
        let Some(core) = self.core.upgrade() else {
            // every pool handle is gone; no claimer is left to serve
            return;
        };
        let epoch = core.epochs[index].fetch_add(1, Ordering::AcqRel) + 1;
        drop(core);

        let backend: Weak<dyn SlotBackend<T>> = self.core.clone();
        let handle = SlotHandle::new(backend, index, epoch);
        match utils::allocate_guarded(&*self.allocator, handle) {
            Ok(object) => {
                let expires_at = utils::expires_at(Instant::now(), self.ttl);
                self.expires[index] = expires_at;
                self.outstanding += 1;
                #[cfg(feature = "stats")]
                self.stats.record_allocation();
                let _ = self.live_tx.send(Entry::Live {
                    index,
                    object,
                    expires_at,
                });
            }
            Err(source) => {
                #[cfg(feature = "stats")]
                self.stats.record_allocation_failure();
                tracing::trace!(index, "allocation failed; offering poisoned entry");
                let _ = self.live_tx.send(Entry::Poisoned { index, source });
            }
        }
    }

    fn handle_release(&mut self, index: usize, object: T) {
        if self.draining {
            self.discard(object);
        } else {
            let _ = self.live_tx.send(Entry::Live {
                index,
                object,
                expires_at: self.expires[index],
            });
        }
    }

    fn handle_refresh(&mut self, index: usize, object: Option<T>) {
        if let Some(old) = object {
            self.discard(old);
        }
        if !self.draining {
            self.provision(index);
        }
    }

    fn begin_drain(&mut self, completion: Completion) {
        if self.draining {
            return;
        }
        self.draining = true;
        self.completion = Some(completion);
        let _ = self.live_tx.send(Entry::ShutDown);
        self.sweep_live();
    }

    /// Empties the live queue, deallocating queued objects. Keeps the
    /// shutdown sentinel in the queue if one was swept up.
    fn sweep_live(&mut self) {
        let mut sentinel_seen = false;
        while let Ok(entry) = self.live_rx.try_recv() {
            match entry {
                Entry::Live { object, .. } => self.discard(object),
                Entry::Poisoned { .. } => {}
                Entry::ShutDown => sentinel_seen = true,
            }
        }
        if sentinel_seen {
            let _ = self.live_tx.send(Entry::ShutDown);
        }
    }

    fn discard(&mut self, object: T) {
        self.outstanding = self.outstanding.saturating_sub(1);
        #[cfg(feature = "stats")]
        self.stats.record_deallocation();
        utils::deallocate_guarded(&*self.allocator, object);
    }
}
