use async_trait::async_trait;
use kb_core::KbResult;

/// The fast tier: a low-latency key/value + sorted-set store (Redis in
/// production). All mutation methods are expected to be atomic at the key.
#[async_trait]
pub trait FastTier: Send + Sync {
    async fn get(&self, key: &str) -> KbResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> KbResult<()>;
    async fn setex(&self, key: &str, ttl_secs: u64, value: &str) -> KbResult<()>;
    async fn delete(&self, key: &str) -> KbResult<()>;
    async fn ttl(&self, key: &str) -> KbResult<Option<i64>>;

    async fn incrby(&self, key: &str, delta: i64) -> KbResult<i64>;
    async fn incrbyfloat(&self, key: &str, delta: f64) -> KbResult<f64>;

    /// `ZADD key score member`.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> KbResult<()>;
    /// `ZREMRANGEBYSCORE key min max`.
    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> KbResult<()>;
    async fn zcard(&self, key: &str) -> KbResult<u64>;
    async fn expire(&self, key: &str, ttl_secs: u64) -> KbResult<()>;

    /// Glob-style key scan, used by the KV-only poll fallback.
    async fn keys(&self, pattern: &str) -> KbResult<Vec<String>>;

    async fn ping(&self) -> bool;
}

/// The durable tier: a relational store that survives fast-tier outages.
/// Carries a plain value plus an optional sorted-set snapshot for forensic
/// recovery (spec.md §4.2 rationale); it never needs atomic zset semantics
/// of its own since the fast tier is authoritative for live rate limiting.
#[async_trait]
pub trait DurableTier: Send + Sync {
    async fn get(&self, key: &str) -> KbResult<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> KbResult<()>;
    async fn delete(&self, key: &str) -> KbResult<()>;
    async fn ttl(&self, key: &str) -> KbResult<Option<i64>>;
    async fn snapshot_zset(&self, key: &str, members: Vec<(String, f64)>) -> KbResult<()>;
    async fn ping(&self) -> bool;
}
