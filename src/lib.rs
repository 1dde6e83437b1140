//! # slotpool
//!
//! A concurrent object pool for reusable, expensive-to-construct resources
//! such as database connections, parsers, decompressors, and buffers.
//!
//! ## Overview
//!
//! `slotpool` manages a bounded population of objects built by a
//! user-supplied [`Allocator`]. Clients *claim* an object for exclusive
//! use and later *release* it back. The pool guarantees:
//!
//! - a fixed ceiling on live objects, decided at construction;
//! - a time-to-live policy: objects older than the configured TTL are
//!   deallocated on the next claim that selects them and replaced with a
//!   fresh allocation;
//! - graceful shutdown that drains in-flight claims and deallocates every
//!   object exactly once;
//! - isolation of allocator failures: a failed allocation surfaces from
//!   the claim that triggered it and the pool stays usable.
//!
//! Two variants implement the same [`Pool`] contract:
//!
//! - [`LockPool`]: a fixed slot array under one mutex, with a condition
//!   variable carrying release signals. The reference implementation.
//! - [`QueuePool`]: a background allocator actor feeding a bounded live
//!   queue, with no central mutex on the claim path.
//!
//! ## Quick start
//!
//! ```rust
//! use std::time::Duration;
//! use slotpool::{AllocError, Allocator, LockPool, PoolConfig, Poolable, SlotHandle};
//!
//! // A pooled object carries the slot handle it was allocated with.
//! struct Connection {
//!     slot: SlotHandle<Connection>,
//!     address: &'static str,
//! }
//!
//! impl Poolable for Connection {
//!     fn slot(&self) -> &SlotHandle<Self> {
//!         &self.slot
//!     }
//! }
//!
//! // The allocator constructs (and destroys) pooled objects.
//! struct Connector;
//!
//! impl Allocator<Connection> for Connector {
//!     fn allocate(&self, slot: SlotHandle<Connection>) -> Result<Connection, AllocError> {
//!         Ok(Connection { slot, address: "db.example.com:5432" })
//!     }
//! }
//!
//! let config = PoolConfig::builder()
//!     .size(4)
//!     .ttl(Duration::from_secs(600))
//!     .allocator(Connector)
//!     .build()
//!     .unwrap();
//! let pool = LockPool::new(config);
//!
//! let conn = pool.claim().unwrap();
//! assert_eq!(conn.address, "db.example.com:5432");
//! conn.release();
//!
//! // Shut down and wait for every object to be deallocated.
//! pool.shutdown().wait();
//! ```
//!
//! ## Claiming with a timeout
//!
//! [`Pool::claim_timeout`] returns `Ok(None)` if no object became
//! available in time. The budget is consumed by waits, so a claim never
//! waits longer than requested even when it is woken and has to keep
//! waiting, and a zero timeout never waits at all.
//!
//! ## Shutdown
//!
//! [`Pool::shutdown`] is idempotent and returns a [`Completion`]. The
//! drain deallocates unclaimed objects immediately and waits for claimed
//! ones to be released. Claims that are blocked when shutdown begins fail
//! promptly with [`Error::ShutDown`] instead of blocking forever.

#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core modules
pub mod config;
pub mod error;
pub mod pool;
pub mod traits;

mod completion;
mod slot;

// Internal modules
mod utils;

// Optional modules
#[cfg(feature = "stats")]
#[cfg_attr(docsrs, doc(cfg(feature = "stats")))]
pub mod stats;

// Re-exports for convenience
pub use completion::Completion;
pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{AllocError, Error, Result};
pub use pool::{LockPool, QueuePool};
pub use slot::SlotHandle;
pub use traits::{Allocator, Pool, Poolable};

#[cfg(feature = "stats")]
pub use stats::{PoolStatistics, StatisticsCollector};

// Prelude for convenient imports
pub mod prelude {
    //! Convenient re-exports of commonly used types

    pub use crate::completion::Completion;
    pub use crate::config::{PoolConfig, PoolConfigBuilder};
    pub use crate::error::{AllocError, Error, Result};
    pub use crate::pool::{LockPool, QueuePool};
    pub use crate::slot::SlotHandle;
    pub use crate::traits::{Allocator, Pool, Poolable};

    #[cfg(feature = "stats")]
    pub use crate::stats::{PoolStatistics, StatisticsCollector};
}
