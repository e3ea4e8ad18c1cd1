//! Counter store implementations - Redis and in-memory fallback.

mod fallback;
mod memory;

pub use fallback::FallbackCounterStore;
pub use memory::InMemoryCounterStore;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisCounterStore};
