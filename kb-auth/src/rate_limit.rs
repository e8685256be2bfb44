//! Sliding-window rate limiting on a sorted set, grounded on
//! `check_rate_limit` / `get_current_usage`.

use kb_cache::TwoTierCache;
use kb_core::{Clock, KbResult};
use std::sync::Arc;

pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_unix: i64,
}

fn rate_key(client_id: &str, minute_bucket: i64) -> String {
    format!("rate_limit:{client_id}:{minute_bucket}")
}

/// Records one request and returns whether the client is within `limit`
/// requests per 60-second window. Uses ZADD + ZREMRANGEBYSCORE + ZCARD +
/// EXPIRE exactly as the original sliding-window implementation does.
pub async fn check_rate_limit(
    cache: &Arc<TwoTierCache>,
    clock: &dyn Clock,
    client_id: &str,
    limit: u32,
) -> KbResult<RateLimitDecision> {
    let now = clock.now().timestamp();
    let window_start = (now - 60) as f64;
    let minute_bucket = now / 60;
    let key = rate_key(client_id, minute_bucket);

    cache.zadd(&key, &now.to_string(), now as f64).await?;
    cache.zremrangebyscore(&key, 0.0, window_start).await?;
    let count = cache.zcard(&key).await?;
    cache.expire(&key, 120).await?;

    let reset_at_unix = (minute_bucket + 1) * 60;
    Ok(RateLimitDecision {
        allowed: count <= limit as u64,
        limit,
        remaining: limit.saturating_sub(count as u32),
        reset_at_unix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_cache::{MemoryDurableTier, MemoryFastTier};
    use kb_core::FixedClock;

    fn cache() -> Arc<TwoTierCache> {
        Arc::new(TwoTierCache::new(Arc::new(MemoryFastTier::default()), Arc::new(MemoryDurableTier::default())))
    }

    #[tokio::test]
    async fn allows_requests_under_the_limit() {
        let cache = cache();
        let clock = FixedClock::new(chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        for _ in 0..5 {
            let decision = check_rate_limit(&cache, &clock, "acme", 10).await.unwrap();
            assert!(decision.allowed);
        }
    }

    #[tokio::test]
    async fn trips_after_exceeding_the_limit() {
        let cache = cache();
        let clock = FixedClock::new(chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let mut last = None;
        for _ in 0..11 {
            last = Some(check_rate_limit(&cache, &clock, "acme", 10).await.unwrap());
        }
        assert!(!last.unwrap().allowed);
    }
}
