use crate::tier::{DurableTier, FastTier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kb_core::KbResult;
use std::collections::BTreeMap;

struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|e| e <= now).unwrap_or(false)
    }
}

/// In-memory fast tier, backed by `DashMap`, carrying value storage plus
/// per-key sorted sets (member -> score) for rate-limit windows.
#[derive(Default)]
pub struct MemoryFastTier {
    values: DashMap<String, Entry>,
    zsets: DashMap<String, BTreeMap<String, f64>>,
}

impl MemoryFastTier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FastTier for MemoryFastTier {
    async fn get(&self, key: &str) -> KbResult<Option<String>> {
        let now = Utc::now();
        Ok(self.values.get(key).and_then(|e| {
            if e.is_expired(now) {
                None
            } else {
                Some(e.value.clone())
            }
        }))
    }

    async fn set(&self, key: &str, value: &str) -> KbResult<()> {
        self.values.insert(key.to_string(), Entry { value: value.to_string(), expires_at: None });
        Ok(())
    }

    async fn setex(&self, key: &str, ttl_secs: u64, value: &str) -> KbResult<()> {
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl_secs as i64);
        self.values.insert(key.to_string(), Entry { value: value.to_string(), expires_at: Some(expires_at) });
        Ok(())
    }

    async fn delete(&self, key: &str) -> KbResult<()> {
        self.values.remove(key);
        self.zsets.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> KbResult<Option<i64>> {
        Ok(self.values.get(key).and_then(|e| {
            e.expires_at.map(|exp| (exp - Utc::now()).num_seconds().max(0))
        }))
    }

    async fn incrby(&self, key: &str, delta: i64) -> KbResult<i64> {
        let mut entry = self.values.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        let current: i64 = entry.value.parse().unwrap_or(0);
        let next = current + delta;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn incrbyfloat(&self, key: &str, delta: f64) -> KbResult<f64> {
        let mut entry = self.values.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        let current: f64 = entry.value.parse().unwrap_or(0.0);
        let next = current + delta;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> KbResult<()> {
        self.zsets.entry(key.to_string()).or_default().insert(member.to_string(), score);
        Ok(())
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> KbResult<()> {
        if let Some(mut set) = self.zsets.get_mut(key) {
            set.retain(|_, score| *score < min || *score > max);
        }
        Ok(())
    }

    async fn zcard(&self, key: &str) -> KbResult<u64> {
        Ok(self.zsets.get(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> KbResult<()> {
        if let Some(mut e) = self.values.get_mut(key) {
            e.expires_at = Some(Utc::now() + chrono::Duration::seconds(ttl_secs as i64));
        }
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> KbResult<Vec<String>> {
        let prefix = pattern.trim_end_matches('*');
        let now = Utc::now();
        Ok(self
            .values
            .iter()
            .filter(|e| !e.is_expired(now) && e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// In-memory durable tier, used for tests and single-process deployments
/// where a real Postgres-backed tier would be overkill.
#[derive(Default)]
pub struct MemoryDurableTier {
    values: DashMap<String, Entry>,
}

impl MemoryDurableTier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableTier for MemoryDurableTier {
    async fn get(&self, key: &str) -> KbResult<Option<String>> {
        let now = Utc::now();
        Ok(self.values.get(key).and_then(|e| {
            if e.is_expired(now) {
                None
            } else {
                Some(e.value.clone())
            }
        }))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> KbResult<()> {
        let expires_at = ttl_secs.map(|t| Utc::now() + chrono::Duration::seconds(t as i64));
        self.values.insert(key.to_string(), Entry { value: value.to_string(), expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> KbResult<()> {
        self.values.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> KbResult<Option<i64>> {
        Ok(self.values.get(key).and_then(|e| {
            e.expires_at.map(|exp| (exp - Utc::now()).num_seconds().max(0))
        }))
    }

    async fn snapshot_zset(&self, key: &str, members: Vec<(String, f64)>) -> KbResult<()> {
        let serialized = serde_json::to_string(&members)?;
        self.values.insert(key.to_string(), Entry { value: serialized, expires_at: None });
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }
}
