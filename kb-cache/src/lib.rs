//! kb-cache: the platform's two-tier Cache Layer (spec.md §4.2).
//!
//! A fast tier (Redis in production, in-memory for tests) absorbs hot-path
//! reads; a durable tier (Postgres, or in-memory for tests) survives
//! fast-tier outages. [`TwoTierCache`] implements read-through on miss and
//! write-through on mutation.

pub mod memory;
pub mod tier;
pub mod two_tier;

#[cfg(feature = "redis-tier")]
pub mod redis_tier;

#[cfg(feature = "postgres-tier")]
pub mod postgres_tier;

pub use memory::{MemoryDurableTier, MemoryFastTier};
pub use tier::{DurableTier, FastTier};
pub use two_tier::TwoTierCache;

#[cfg(feature = "redis-tier")]
pub use redis_tier::RedisFastTier;

#[cfg(feature = "postgres-tier")]
pub use postgres_tier::PostgresDurableTier;
