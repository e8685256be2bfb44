use crate::tier::{DurableTier, FastTier};
use kb_core::KbResult;
use std::sync::Arc;
use tracing::warn;

/// Default TTL used to repopulate the fast tier after a durable-tier hit.
const DEFAULT_REHYDRATE_TTL_SECS: u64 = 3600;

/// The Cache Layer (spec.md §4.2): read-through on miss, write-through on
/// mutation, last-writer-wins at the key. The durable tier is the
/// survivability backstop; the fast tier absorbs hot-path read cost.
pub struct TwoTierCache {
    fast: Arc<dyn FastTier>,
    durable: Arc<dyn DurableTier>,
}

impl TwoTierCache {
    pub fn new(fast: Arc<dyn FastTier>, durable: Arc<dyn DurableTier>) -> Self {
        Self { fast, durable }
    }

    pub async fn get(&self, key: &str) -> KbResult<Option<String>> {
        if let Some(v) = self.fast.get(key).await? {
            return Ok(Some(v));
        }
        match self.durable.get(key).await? {
            Some(v) => {
                let ttl = self.durable.ttl(key).await?.unwrap_or(DEFAULT_REHYDRATE_TTL_SECS as i64);
                let ttl = if ttl > 0 { ttl as u64 } else { DEFAULT_REHYDRATE_TTL_SECS };
                if let Err(e) = self.fast.setex(key, ttl, &v).await {
                    warn!(key, error = %e, "failed to rehydrate fast tier after durable hit");
                }
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> KbResult<()> {
        self.fast.set(key, value).await?;
        self.durable.set(key, value, None).await?;
        Ok(())
    }

    pub async fn setex(&self, key: &str, ttl_secs: u64, value: &str) -> KbResult<()> {
        self.fast.setex(key, ttl_secs, value).await?;
        self.durable.set(key, value, Some(ttl_secs)).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> KbResult<()> {
        self.fast.delete(key).await?;
        self.durable.delete(key).await?;
        Ok(())
    }

    /// Atomic on the fast tier; the durable tier mirrors the latest
    /// observed value only (no replay of the increment sequence).
    pub async fn incrby(&self, key: &str, delta: i64) -> KbResult<i64> {
        let next = self.fast.incrby(key, delta).await?;
        if let Err(e) = self.durable.set(key, &next.to_string(), None).await {
            warn!(key, error = %e, "failed to mirror incrby to durable tier");
        }
        Ok(next)
    }

    pub async fn incrbyfloat(&self, key: &str, delta: f64) -> KbResult<f64> {
        let next = self.fast.incrbyfloat(key, delta).await?;
        if let Err(e) = self.durable.set(key, &next.to_string(), None).await {
            warn!(key, error = %e, "failed to mirror incrbyfloat to durable tier");
        }
        Ok(next)
    }

    pub async fn ttl(&self, key: &str) -> KbResult<Option<i64>> {
        if let Some(ttl) = self.fast.ttl(key).await? {
            return Ok(Some(ttl));
        }
        match self.durable.ttl(key).await? {
            Some(ttl) => {
                if let Some(v) = self.durable.get(key).await? {
                    let rehydrate_ttl = if ttl > 0 { ttl as u64 } else { DEFAULT_REHYDRATE_TTL_SECS };
                    let _ = self.fast.setex(key, rehydrate_ttl, &v).await;
                }
                Ok(Some(ttl))
            }
            None => Ok(None),
        }
    }

    pub async fn zadd(&self, key: &str, member: &str, score: f64) -> KbResult<()> {
        self.fast.zadd(key, member, score).await
    }

    pub async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> KbResult<()> {
        self.fast.zremrangebyscore(key, min, max).await
    }

    pub async fn zcard(&self, key: &str) -> KbResult<u64> {
        self.fast.zcard(key).await
    }

    pub async fn expire(&self, key: &str, ttl_secs: u64) -> KbResult<()> {
        self.fast.expire(key, ttl_secs).await
    }

    pub async fn keys(&self, pattern: &str) -> KbResult<Vec<String>> {
        self.fast.keys(pattern).await
    }

    pub async fn ping(&self) -> bool {
        self.fast.ping().await || self.durable.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDurableTier, MemoryFastTier};

    fn build() -> TwoTierCache {
        TwoTierCache::new(Arc::new(MemoryFastTier::new()), Arc::new(MemoryDurableTier::new()))
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = build();
        cache.set("k", "v").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn durable_hit_rehydrates_fast_tier() {
        let fast = Arc::new(MemoryFastTier::new());
        let durable = Arc::new(MemoryDurableTier::new());
        durable.set("k", "from-durable", None).await.unwrap();
        let cache = TwoTierCache::new(fast.clone(), durable);

        assert_eq!(cache.get("k").await.unwrap(), Some("from-durable".to_string()));
        assert_eq!(fast.get("k").await.unwrap(), Some("from-durable".to_string()));
    }

    #[tokio::test]
    async fn delete_propagates_to_both_tiers() {
        let cache = build();
        cache.set("k", "v").await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn sliding_window_rate_counter() {
        let cache = build();
        cache.zadd("rl:client", "req-1", 1.0).await.unwrap();
        cache.zadd("rl:client", "req-2", 2.0).await.unwrap();
        cache.zremrangebyscore("rl:client", f64::MIN, 1.5).await.unwrap();
        assert_eq!(cache.zcard("rl:client").await.unwrap(), 1);
    }
}
