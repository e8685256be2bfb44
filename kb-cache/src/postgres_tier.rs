//! Postgres-backed durable tier over `cache_data(key PK, value text,
//! expires_at timestamp)` (spec.md §6 persisted-state layout).

use crate::tier::DurableTier;
use async_trait::async_trait;
use chrono::Utc;
use kb_core::{KbError, KbResult};
use sqlx::PgPool;

pub struct PostgresDurableTier {
    pool: PgPool,
}

impl PostgresDurableTier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DurableTier for PostgresDurableTier {
    async fn get(&self, key: &str) -> KbResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT value FROM cache_data WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| KbError::transient(format!("cache_data read: {e}")))?;
        Ok(row.map(|(v,)| v))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> KbResult<()> {
        let expires_at = ttl_secs.map(|t| Utc::now() + chrono::Duration::seconds(t as i64));
        sqlx::query(
            "INSERT INTO cache_data (key, value, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| KbError::transient(format!("cache_data write: {e}")))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> KbResult<()> {
        sqlx::query("DELETE FROM cache_data WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| KbError::transient(format!("cache_data delete: {e}")))?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> KbResult<Option<i64>> {
        let row: Option<(Option<chrono::DateTime<Utc>>,)> =
            sqlx::query_as("SELECT expires_at FROM cache_data WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| KbError::transient(format!("cache_data ttl: {e}")))?;
        Ok(row.and_then(|(exp,)| exp).map(|exp| (exp - Utc::now()).num_seconds().max(0)))
    }

    async fn snapshot_zset(&self, key: &str, members: Vec<(String, f64)>) -> KbResult<()> {
        let serialized = serde_json::to_string(&members)?;
        self.set(key, &serialized, None).await
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
