//! Builder for pool configuration.

use std::sync::Arc;
use std::time::Duration;

use super::PoolConfig;
use crate::error::{Error, Result};
use crate::traits::{Allocator, Poolable};

/// Builder for constructing a `PoolConfig` with validation.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use slotpool::PoolConfig;
/// # use slotpool::{AllocError, Allocator, Poolable, SlotHandle};
/// # struct Thing { slot: SlotHandle<Thing> }
/// # impl Poolable for Thing {
/// #     fn slot(&self) -> &SlotHandle<Self> { &self.slot }
/// # }
/// # struct ThingAllocator;
/// # impl Allocator<Thing> for ThingAllocator {
/// #     fn allocate(&self, slot: SlotHandle<Thing>) -> Result<Thing, AllocError> {
/// #         Ok(Thing { slot })
/// #     }
/// # }
///
/// let config = PoolConfig::<Thing>::builder()
///     .size(16)
///     .ttl(Duration::from_secs(300))
///     .allocator(ThingAllocator)
///     .build()
///     .unwrap();
/// ```
pub struct PoolConfigBuilder<T: Poolable> {
    size: Option<usize>,
    ttl: Option<Duration>,
    allocator: Option<Arc<dyn Allocator<T>>>,
}

impl<T: Poolable> PoolConfigBuilder<T> {
    /// Creates a new builder with no values set.
    pub fn new() -> Self {
        Self {
            size: None,
            ttl: None,
            allocator: None,
        }
    }

    /// Sets the pool size: the fixed ceiling on live objects.
    ///
    /// This is a required setting and must be at least 1.
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the time-to-live for pooled objects.
    ///
    /// An object older than this is deallocated on the next claim that
    /// selects it and replaced with a fresh allocation. Required; must be
    /// non-zero.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the allocator that constructs and destroys pooled objects.
    ///
    /// Required. An `Arc<A>` works here too, which is the way to share one
    /// allocator between a pool and the code observing it.
    pub fn allocator(mut self, allocator: impl Allocator<T>) -> Self {
        self.allocator = Some(Arc::new(allocator));
        self
    }

    /// Builds the configuration, validating all parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if:
    /// - size is not set or is 0
    /// - ttl is not set or is zero
    /// - no allocator was supplied
    pub fn build(self) -> Result<PoolConfig<T>> {
        let size = self
            .size
            .ok_or_else(|| Error::invalid_config("size must be specified"))?;
        if size == 0 {
            return Err(Error::invalid_config("size must be at least 1"));
        }

        let ttl = self
            .ttl
            .ok_or_else(|| Error::invalid_config("ttl must be specified"))?;
        if ttl.is_zero() {
            return Err(Error::invalid_config("ttl must be non-zero"));
        }

        let allocator = self
            .allocator
            .ok_or_else(|| Error::invalid_config("an allocator must be supplied"))?;

        Ok(PoolConfig {
            size,
            ttl,
            allocator,
        })
    }
}

impl<T: Poolable> Default for PoolConfigBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
