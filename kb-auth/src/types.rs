use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API client classification governing rate limits and permissions
/// (spec.md §9 glossary "Tier").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
    Enterprise,
    Admin,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
            Tier::Admin => "admin",
        }
    }

    /// Grounded on `get_tier_permissions`.
    pub fn permissions(&self) -> Vec<&'static str> {
        let base = vec!["analyze", "status", "results"];
        match self {
            Tier::Free => base,
            Tier::Pro => [base, vec!["webhook", "priority"]].concat(),
            Tier::Enterprise => [base, vec!["webhook", "priority", "custom_models", "batch"]].concat(),
            Tier::Admin => {
                [base, vec!["webhook", "priority", "custom_models", "batch", "manage_keys"]].concat()
            }
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            "enterprise" => Ok(Tier::Enterprise),
            "admin" => Ok(Tier::Admin),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

/// Stored under `api_keys:{key}` with a 1-year TTL (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub client_id: String,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub rate_limit_override: Option<u32>,
    pub permissions: Vec<String>,
}

/// The authenticated context produced by this collaborator and consumed by
/// ingestion (spec.md §2 component 11).
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub client_id: String,
    pub tier: Tier,
    pub permissions: Vec<String>,
}

impl AuthContext {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

impl From<ApiKeyRecord> for AuthContext {
    fn from(record: ApiKeyRecord) -> Self {
        Self { client_id: record.client_id, tier: record.tier, permissions: record.permissions }
    }
}
