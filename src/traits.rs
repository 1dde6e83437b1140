//! Traits for working with object pools.

use std::time::Duration;

use crate::completion::Completion;
use crate::error::{AllocError, Result};
use crate::slot::SlotHandle;

/// A trait for user types managed by a pool.
///
/// A poolable object carries the [`SlotHandle`] it was allocated with, and
/// hands itself back to that slot when released. The pool never inspects
/// the object beyond moving it in and out of its slot.
///
/// # Examples
///
/// ```rust
/// use slotpool::{Poolable, SlotHandle};
///
/// struct Connection {
///     slot: SlotHandle<Connection>,
///     address: String,
/// }
///
/// impl Poolable for Connection {
///     fn slot(&self) -> &SlotHandle<Self> {
///         &self.slot
///     }
/// }
/// ```
pub trait Poolable: Send + Sized + 'static {
    /// Returns the slot handle bound to this object at allocation time.
    fn slot(&self) -> &SlotHandle<Self>;

    /// Returns this object to its pool, restoring capacity and waking a
    /// waiting claimer.
    ///
    /// Release consumes the object, so a second release of the same object
    /// cannot be expressed. The pool additionally treats any stray release
    /// (for example through a stale cloned handle) as a no-op.
    fn release(self) {
        let slot = self.slot().clone();
        slot.release(self);
    }
}

/// A user-supplied factory that constructs and destroys pooled objects.
///
/// Both methods may be invoked concurrently from claim, helper, and drain
/// threads.
///
/// # Examples
///
/// ```rust
/// use slotpool::{AllocError, Allocator, Poolable, SlotHandle};
///
/// struct Buffer {
///     slot: SlotHandle<Buffer>,
///     bytes: Vec<u8>,
/// }
///
/// impl Poolable for Buffer {
///     fn slot(&self) -> &SlotHandle<Self> {
///         &self.slot
///     }
/// }
///
/// struct BufferAllocator;
///
/// impl Allocator<Buffer> for BufferAllocator {
///     fn allocate(&self, slot: SlotHandle<Buffer>) -> Result<Buffer, AllocError> {
///         Ok(Buffer { slot, bytes: vec![0; 4096] })
///     }
/// }
/// ```
pub trait Allocator<T: Poolable>: Send + Sync + 'static {
    /// Constructs a new object bound to `slot`.
    ///
    /// The returned object must store the given handle so that its
    /// [`Poolable::release`] returns it to this slot. An `Err` surfaces
    /// from the claim as [`Error::AllocationFailed`]; the pool stays usable
    /// and a later claim retries.
    ///
    /// [`Error::AllocationFailed`]: crate::Error::AllocationFailed
    fn allocate(&self, slot: SlotHandle<T>) -> core::result::Result<T, AllocError>;

    /// Destroys an object that has expired or is being drained at shutdown.
    ///
    /// Called at most once per allocated object. Errors are swallowed by
    /// the pool (logged, never surfaced), because they occur on claim or
    /// drain threads whose callers cannot meaningfully react.
    fn deallocate(&self, object: T) -> core::result::Result<(), AllocError> {
        drop(object);
        Ok(())
    }
}

impl<T: Poolable, A: Allocator<T> + ?Sized> Allocator<T> for std::sync::Arc<A> {
    fn allocate(&self, slot: SlotHandle<T>) -> core::result::Result<T, AllocError> {
        (**self).allocate(slot)
    }

    fn deallocate(&self, object: T) -> core::result::Result<(), AllocError> {
        (**self).deallocate(object)
    }
}

/// The public contract shared by both pool variants.
///
/// [`LockPool`] and [`QueuePool`] differ in concurrency discipline but
/// satisfy the same contract; code written against this trait runs on
/// either.
///
/// [`LockPool`]: crate::LockPool
/// [`QueuePool`]: crate::QueuePool
pub trait Pool<T: Poolable>: Send + Sync {
    /// Claims an object for exclusive use, blocking until one is available.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] if the pool has been shut down,
    /// [`Error::AllocationFailed`] if the allocator failed.
    ///
    /// [`Error::ShutDown`]: crate::Error::ShutDown
    /// [`Error::AllocationFailed`]: crate::Error::AllocationFailed
    fn claim(&self) -> Result<T>;

    /// Claims an object, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` if the timeout elapsed. A zero timeout does not
    /// wait at all: it returns an immediately available object or `None`.
    /// The timeout budget is consumed by waits, so a claim never waits
    /// longer than `timeout` in total even across several internal wakeups.
    fn claim_timeout(&self, timeout: Duration) -> Result<Option<T>>;

    /// Shuts the pool down and starts an asynchronous drain.
    ///
    /// Idempotent: repeated calls observe the same drain. After this call,
    /// pending and subsequent claims fail promptly with
    /// [`Error::ShutDown`]. The drain deallocates every unclaimed object
    /// and waits for claimed ones to be released before deallocating them.
    ///
    /// [`Error::ShutDown`]: crate::Error::ShutDown
    fn shutdown(&self) -> Completion;
}
