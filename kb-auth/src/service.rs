use crate::brute_force::{is_ip_banned, record_failed_auth};
use crate::rate_limit::{check_rate_limit, RateLimitDecision};
use crate::types::AuthContext;
use crate::validate::validate_api_key;
use kb_cache::TwoTierCache;
use kb_core::config::RateLimitsSection;
use kb_core::{Clock, KbError, KbResult};
use std::sync::Arc;

/// The Auth & Rate-Limit Collaborator (spec.md §2 component 11): produces
/// an [`AuthContext`] consumed by ingestion, or an error the HTTP edge maps
/// to 401/403/429.
pub struct AuthService {
    cache: Arc<TwoTierCache>,
    clock: Arc<dyn Clock>,
    rate_limits: RateLimitsSection,
}

impl AuthService {
    pub fn new(cache: Arc<TwoTierCache>, clock: Arc<dyn Clock>, rate_limits: RateLimitsSection) -> Self {
        Self { cache, clock, rate_limits }
    }

    /// Validates the key, checks the brute-force ban, and requires the
    /// caller to supply `client_ip` so failed attempts can be attributed.
    pub async fn authenticate(&self, api_key: &str, client_ip: &str) -> KbResult<AuthContext> {
        if is_ip_banned(&self.cache, client_ip).await {
            return Err(KbError::authorization("client IP is temporarily banned"));
        }

        match validate_api_key(&self.cache, api_key).await {
            Ok(record) => Ok(record.into()),
            Err(err) => {
                record_failed_auth(&self.cache, api_key, client_ip).await?;
                Err(err)
            }
        }
    }

    pub fn require_permission(&self, ctx: &AuthContext, permission: &str) -> KbResult<()> {
        if ctx.has_permission(permission) {
            Ok(())
        } else {
            Err(KbError::authorization(format!("operation requires the '{permission}' permission")))
        }
    }

    pub async fn check_rate_limit(&self, ctx: &AuthContext) -> KbResult<RateLimitDecision> {
        let limit = self
            .rate_limits
            .tiers
            .get(ctx.tier.as_str())
            .map(|t| t.requests_per_minute)
            .unwrap_or(10);
        check_rate_limit(&self.cache, self.clock.as_ref(), &ctx.client_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::generate_api_key;
    use crate::types::Tier;
    use crate::validate::store_api_key;
    use kb_cache::{MemoryDurableTier, MemoryFastTier};
    use kb_core::SystemClock;

    fn service() -> AuthService {
        let cache = Arc::new(TwoTierCache::new(Arc::new(MemoryFastTier::default()), Arc::new(MemoryDurableTier::default())));
        AuthService::new(cache, Arc::new(SystemClock), RateLimitsSection::default())
    }

    #[tokio::test]
    async fn authenticates_a_stored_key() {
        let service = service();
        let (key, record) = generate_api_key("acme", Tier::Free);
        store_api_key(&service.cache, &key, &record).await.unwrap();
        let ctx = service.authenticate(&key, "1.2.3.4").await.unwrap();
        assert_eq!(ctx.client_id, "acme");
    }

    #[tokio::test]
    async fn rejects_unknown_key_and_records_failure() {
        let service = service();
        let err = service.authenticate("kb_free_unknown", "1.2.3.4").await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn free_tier_lacks_webhook_permission() {
        let service = service();
        let (key, record) = generate_api_key("acme", Tier::Free);
        store_api_key(&service.cache, &key, &record).await.unwrap();
        let ctx = service.authenticate(&key, "1.2.3.4").await.unwrap();
        assert!(service.require_permission(&ctx, "webhook").is_err());
    }
}
