//! Optional statistics collection for pools.
//!
//! Enabled with the `stats` cargo feature. Counters are updated with
//! relaxed atomics on the claim and release paths, so the cost when
//! enabled is a handful of uncontended atomic increments.

mod collector;

pub use collector::{PoolStatistics, StatisticsCollector};
