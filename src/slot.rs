//! Slot handles that bind pooled objects back to their pool.

use core::fmt;
use std::sync::Weak;

/// Internal trait for pool operations needed by slot handles.
///
/// This trait is used internally to allow handles to work with different
/// pool variants without exposing implementation details.
pub(crate) trait SlotBackend<T>: Send + Sync {
    #[doc(hidden)]
    fn release(&self, index: usize, epoch: u64, object: T);
}

/// A handle binding a pooled object to its slot.
///
/// The pool passes a `SlotHandle` to [`Allocator::allocate`], and the
/// allocator must store it inside the object it constructs. The object's
/// [`Poolable::release`] delegates here, which returns the object to the
/// slot it was allocated into.
///
/// The handle holds a weak reference to the pool, so pooled objects never
/// keep a dropped pool alive. Releasing through a handle whose pool is gone,
/// or whose slot has since been reallocated, quietly discards the object.
///
/// [`Allocator::allocate`]: crate::Allocator::allocate
/// [`Poolable::release`]: crate::Poolable::release
pub struct SlotHandle<T> {
    backend: Weak<dyn SlotBackend<T>>,
    index: usize,
    epoch: u64,
}

impl<T> SlotHandle<T> {
    pub(crate) fn new(backend: Weak<dyn SlotBackend<T>>, index: usize, epoch: u64) -> Self {
        Self {
            backend,
            index,
            epoch,
        }
    }

    /// Returns the position of this slot within the pool.
    ///
    /// This is useful for debugging but should not be relied upon for
    /// application logic.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns `object` to the slot this handle is bound to, restoring the
    /// pool's capacity and waking a waiting claimer.
    ///
    /// A stray release (slot not claimed, slot reallocated since, or pool
    /// dropped) is a silent no-op; the object is dropped.
    pub fn release(&self, object: T) {
        match self.backend.upgrade() {
            Some(backend) => backend.release(self.index, self.epoch, object),
            None => {
                tracing::debug!(index = self.index, "release after pool drop; object discarded");
            }
        }
    }
}

impl<T> Clone for SlotHandle<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Weak::clone(&self.backend),
            index: self.index,
            epoch: self.epoch,
        }
    }
}

// Manual impl rather than derive so `T` itself need not be Debug.
impl<T> fmt::Debug for SlotHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotHandle")
            .field("index", &self.index)
            .field("epoch", &self.epoch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        released: Mutex<Vec<(usize, u64)>>,
    }

    impl SlotBackend<u32> for Recorder {
        fn release(&self, index: usize, epoch: u64, _object: u32) {
            self.released.lock().unwrap().push((index, epoch));
        }
    }

    #[test]
    fn release_forwards_to_backend() {
        let recorder = Arc::new(Recorder {
            released: Mutex::new(Vec::new()),
        });
        let backend: Weak<dyn SlotBackend<u32>> = {
            let backend_arc: Arc<dyn SlotBackend<u32>> = recorder.clone();
            Arc::downgrade(&backend_arc)
        };

        let handle = SlotHandle::new(backend, 3, 7);
        assert_eq!(handle.index(), 3);
        handle.release(42);

        assert_eq!(*recorder.released.lock().unwrap(), vec![(3, 7)]);
    }

    #[test]
    fn release_after_pool_drop_is_a_noop() {
        let recorder = Arc::new(Recorder {
            released: Mutex::new(Vec::new()),
        });
        let backend: Weak<dyn SlotBackend<u32>> = {
            let backend_arc: Arc<dyn SlotBackend<u32>> = recorder.clone();
            Arc::downgrade(&backend_arc)
        };
        let handle = SlotHandle::new(backend, 0, 1);

        drop(recorder);
        handle.release(42);
    }

    #[test]
    fn clone_preserves_identity() {
        let recorder = Arc::new(Recorder {
            released: Mutex::new(Vec::new()),
        });
        let backend: Weak<dyn SlotBackend<u32>> = {
            let backend_arc: Arc<dyn SlotBackend<u32>> = recorder.clone();
            Arc::downgrade(&backend_arc)
        };
        let handle = SlotHandle::new(backend, 5, 2);

        let clone = handle.clone();
        clone.release(9);
        assert_eq!(*recorder.released.lock().unwrap(), vec![(5, 2)]);
    }
}
