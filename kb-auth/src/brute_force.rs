//! Grounded on `log_failed_auth`: counts failed attempts per client IP and
//! imposes a temporary ban after a threshold.

use crate::keygen::mask_api_key;
use kb_cache::TwoTierCache;
use kb_core::KbResult;
use std::sync::Arc;
use tracing::{error, warn};

const FAILED_AUTH_WINDOW_SECS: u64 = 3600;
const BAN_THRESHOLD: i64 = 10;
const BAN_DURATION_SECS: u64 = 3600;

fn failed_auth_key(client_ip: &str) -> String {
    format!("failed_auth:{client_ip}")
}

fn banned_key(client_ip: &str) -> String {
    format!("ip_banned:{client_ip}")
}

pub async fn is_ip_banned(cache: &Arc<TwoTierCache>, client_ip: &str) -> bool {
    cache.get(&banned_key(client_ip)).await.ok().flatten().is_some()
}

pub async fn record_failed_auth(cache: &Arc<TwoTierCache>, api_key: &str, client_ip: &str) -> KbResult<()> {
    warn!(api_key = %mask_api_key(api_key), client_ip, "failed authentication attempt");

    let key = failed_auth_key(client_ip);
    let count = cache.incrby(&key, 1).await?;
    cache.expire(&key, FAILED_AUTH_WINDOW_SECS).await?;

    if count >= BAN_THRESHOLD {
        error!(client_ip, attempt_count = count, "potential brute force attack detected");
        cache.setex(&banned_key(client_ip), BAN_DURATION_SECS, "1").await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_cache::{MemoryDurableTier, MemoryFastTier};

    fn cache() -> Arc<TwoTierCache> {
        Arc::new(TwoTierCache::new(Arc::new(MemoryFastTier::default()), Arc::new(MemoryDurableTier::default())))
    }

    #[tokio::test]
    async fn bans_ip_after_threshold_failures() {
        let cache = cache();
        for _ in 0..9 {
            record_failed_auth(&cache, "kb_free_x", "1.2.3.4").await.unwrap();
        }
        assert!(!is_ip_banned(&cache, "1.2.3.4").await);
        record_failed_auth(&cache, "kb_free_x", "1.2.3.4").await.unwrap();
        assert!(is_ip_banned(&cache, "1.2.3.4").await);
    }

    #[tokio::test]
    async fn unrelated_ip_stays_unbanned() {
        let cache = cache();
        record_failed_auth(&cache, "kb_free_x", "1.2.3.4").await.unwrap();
        assert!(!is_ip_banned(&cache, "9.9.9.9").await);
    }
}
