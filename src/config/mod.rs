//! Configuration types for object pools.

mod builder;

pub use builder::PoolConfigBuilder;

use std::sync::Arc;
use std::time::Duration;

use crate::traits::{Allocator, Poolable};

/// Configuration for an object pool.
///
/// Use `PoolConfig::builder()` to construct a configuration with
/// validation. The pool takes a snapshot of the configuration exactly once
/// at construction; a `PoolConfig` handed to a pool can be freely cloned,
/// rebuilt, or dropped afterwards without affecting the running pool.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use slotpool::{AllocError, Allocator, PoolConfig, Poolable, SlotHandle};
///
/// struct Parser { slot: SlotHandle<Parser> }
/// impl Poolable for Parser {
///     fn slot(&self) -> &SlotHandle<Self> { &self.slot }
/// }
///
/// struct ParserAllocator;
/// impl Allocator<Parser> for ParserAllocator {
///     fn allocate(&self, slot: SlotHandle<Parser>) -> Result<Parser, AllocError> {
///         Ok(Parser { slot })
///     }
/// }
///
/// let config = PoolConfig::builder()
///     .size(8)
///     .ttl(Duration::from_secs(600))
///     .allocator(ParserAllocator)
///     .build()
///     .unwrap();
/// assert_eq!(config.size(), 8);
/// ```
pub struct PoolConfig<T: Poolable> {
    /// Number of slots; the fixed ceiling on live objects
    pub(crate) size: usize,

    /// Maximum age of an allocated object
    pub(crate) ttl: Duration,

    /// User-supplied factory for pooled objects
    pub(crate) allocator: Arc<dyn Allocator<T>>,
}

impl<T: Poolable> PoolConfig<T> {
    /// Creates a new builder for constructing a pool configuration.
    pub fn builder() -> PoolConfigBuilder<T> {
        PoolConfigBuilder::new()
    }

    /// Returns the configured pool size.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the configured time-to-live for pooled objects.
    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn allocator(&self) -> Arc<dyn Allocator<T>> {
        Arc::clone(&self.allocator)
    }
}

impl<T: Poolable> Clone for PoolConfig<T> {
    fn clone(&self) -> Self {
        Self {
            size: self.size,
            ttl: self.ttl,
            allocator: Arc::clone(&self.allocator),
        }
    }
}

impl<T: Poolable> core::fmt::Debug for PoolConfig<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("size", &self.size)
            .field("ttl", &self.ttl)
            .finish()
    }
}
