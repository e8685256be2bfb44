//! Grounded on `app/core/auth.py::requires_permission`: one call that
//! authenticates the key, checks the sliding-window rate limit, and
//! enforces the tier's permission list, in that order.

use axum::http::HeaderMap;
use kb_auth::{AuthContext, RateLimitDecision};

use crate::error::ApiError;
use crate::state::AppState;

pub struct Authorized {
    pub ctx: AuthContext,
    pub rate_limit: RateLimitDecision,
}

fn api_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::unauthorized("X-API-Key header is required"))
}

fn client_ip(headers: &HeaderMap) -> &str {
    headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()).unwrap_or("unknown")
}

pub async fn require_permission(state: &AppState, headers: &HeaderMap, permission: &str) -> Result<Authorized, ApiError> {
    let key = api_key(headers)?;
    let ctx = state.auth.authenticate(key, client_ip(headers)).await?;

    let rate_limit = state.auth.check_rate_limit(&ctx).await?;
    if !rate_limit.allowed {
        return Err(ApiError::rate_limit_exceeded(rate_limit.limit, rate_limit.reset_at_unix));
    }

    state
        .auth
        .require_permission(&ctx, permission)
        .map_err(|_| ApiError::forbidden(format!("operation requires the '{permission}' permission")))?;

    Ok(Authorized { ctx, rate_limit })
}

pub fn rate_limit_headers(decision: &RateLimitDecision) -> [(&'static str, String); 3] {
    [
        ("x-ratelimit-limit", decision.limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        ("x-ratelimit-reset", decision.reset_at_unix.to_string()),
    ]
}
