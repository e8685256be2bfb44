//! Grounded on `validate_api_key`.

use crate::keygen::storage_key;
use crate::types::ApiKeyRecord;
use chrono::Utc;
use kb_cache::TwoTierCache;
use kb_core::{KbError, KbResult};
use std::sync::Arc;

pub async fn validate_api_key(cache: &Arc<TwoTierCache>, api_key: &str) -> KbResult<ApiKeyRecord> {
    if api_key.is_empty() {
        return Err(KbError::authorization("API key is required"));
    }

    let raw = cache
        .get(&storage_key(api_key))
        .await?
        .ok_or_else(|| KbError::authorization("invalid API key"))?;

    let record: ApiKeyRecord =
        serde_json::from_str(&raw).map_err(|_| KbError::authorization("invalid API key data"))?;

    if record.expires_at < Utc::now() {
        return Err(KbError::authorization("expired API key"));
    }

    Ok(record)
}

pub async fn store_api_key(cache: &Arc<TwoTierCache>, api_key: &str, record: &ApiKeyRecord) -> KbResult<()> {
    let body = serde_json::to_string(record)?;
    cache.setex(&storage_key(api_key), crate::keygen::API_KEY_TTL_SECS, &body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::generate_api_key;
    use crate::types::Tier;
    use kb_cache::{MemoryDurableTier, MemoryFastTier};

    fn cache() -> Arc<TwoTierCache> {
        Arc::new(TwoTierCache::new(Arc::new(MemoryFastTier::default()), Arc::new(MemoryDurableTier::default())))
    }

    #[tokio::test]
    async fn missing_key_is_unauthorized() {
        let err = validate_api_key(&cache(), "").await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn unknown_key_is_unauthorized() {
        let err = validate_api_key(&cache(), "kb_free_doesnotexist").await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn stored_key_validates_successfully() {
        let cache = cache();
        let (key, record) = generate_api_key("acme", Tier::Pro);
        store_api_key(&cache, &key, &record).await.unwrap();
        let validated = validate_api_key(&cache, &key).await.unwrap();
        assert_eq!(validated.client_id, "acme");
    }
}
