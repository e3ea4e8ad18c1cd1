//! # Herbarium Infrastructure
//!
//! Concrete implementations of the ports defined in `herbarium-core`.
//! This crate contains the counter stores behind admission control.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-process counters only
//! - `redis` - Shared Redis counter store

pub mod rate_limit;

pub use rate_limit::{FallbackCounterStore, InMemoryCounterStore};

#[cfg(feature = "redis")]
pub use rate_limit::{RedisConfig, RedisCounterStore};
