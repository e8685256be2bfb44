//! Redis-backed fast tier, grounded on the connection-manager pattern used
//! throughout the pack's Redis storage adapters: one client, one cloned
//! `ConnectionManager` per call (cheap, pipelined under the hood).

use crate::tier::FastTier;
use async_trait::async_trait;
use kb_core::{KbError, KbResult};
use redis::AsyncCommands;

pub struct RedisFastTier {
    connection_manager: redis::aio::ConnectionManager,
}

impl RedisFastTier {
    pub async fn connect(url: &str) -> KbResult<Self> {
        Self::connect_with_retry(url, 5).await
    }

    /// Exponential backoff retry on initial connect, matching the
    /// `connect_with_retry` behavior of the original job repository.
    pub async fn connect_with_retry(url: &str, max_attempts: u32) -> KbResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| KbError::fatal(format!("invalid redis url: {e}")))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match client.get_connection_manager().await {
                Ok(connection_manager) => return Ok(Self { connection_manager }),
                Err(e) if attempt < max_attempts => {
                    let backoff = std::time::Duration::from_millis(200 * 2u64.pow(attempt));
                    tracing::warn!(attempt, error = %e, "redis connect failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(KbError::fatal(format!("redis connect failed: {e}"))),
            }
        }
    }

    fn map_err(e: redis::RedisError) -> KbError {
        KbError::transient(format!("redis error: {e}"))
    }
}

#[async_trait]
impl FastTier for RedisFastTier {
    async fn get(&self, key: &str) -> KbResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        conn.get(key).await.map_err(Self::map_err)
    }

    async fn set(&self, key: &str, value: &str) -> KbResult<()> {
        let mut conn = self.connection_manager.clone();
        conn.set(key, value).await.map_err(Self::map_err)
    }

    async fn setex(&self, key: &str, ttl_secs: u64, value: &str) -> KbResult<()> {
        let mut conn = self.connection_manager.clone();
        conn.set_ex(key, value, ttl_secs).await.map_err(Self::map_err)
    }

    async fn delete(&self, key: &str) -> KbResult<()> {
        let mut conn = self.connection_manager.clone();
        conn.del(key).await.map_err(Self::map_err)
    }

    async fn ttl(&self, key: &str) -> KbResult<Option<i64>> {
        let mut conn = self.connection_manager.clone();
        let ttl: i64 = conn.ttl(key).await.map_err(Self::map_err)?;
        Ok(if ttl >= 0 { Some(ttl) } else { None })
    }

    async fn incrby(&self, key: &str, delta: i64) -> KbResult<i64> {
        let mut conn = self.connection_manager.clone();
        conn.incr(key, delta).await.map_err(Self::map_err)
    }

    async fn incrbyfloat(&self, key: &str, delta: f64) -> KbResult<f64> {
        let mut conn = self.connection_manager.clone();
        conn.incr(key, delta).await.map_err(Self::map_err)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> KbResult<()> {
        let mut conn = self.connection_manager.clone();
        conn.zadd(key, member, score).await.map_err(Self::map_err)
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> KbResult<()> {
        let mut conn = self.connection_manager.clone();
        conn.zrembyscore(key, min, max).await.map_err(Self::map_err)
    }

    async fn zcard(&self, key: &str) -> KbResult<u64> {
        let mut conn = self.connection_manager.clone();
        conn.zcard(key).await.map_err(Self::map_err)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> KbResult<()> {
        let mut conn = self.connection_manager.clone();
        conn.expire(key, ttl_secs as i64).await.map_err(Self::map_err)
    }

    async fn keys(&self, pattern: &str) -> KbResult<Vec<String>> {
        let mut conn = self.connection_manager.clone();
        conn.keys(pattern).await.map_err(Self::map_err)
    }

    async fn ping(&self) -> bool {
        let mut conn = self.connection_manager.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await.is_ok()
    }
}
