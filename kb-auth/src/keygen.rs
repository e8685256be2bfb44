//! Grounded on `generate_api_key` / `mask_api_key`.

use crate::types::{ApiKeyRecord, Tier};
use chrono::{Duration, Utc};
use rand::RngCore;

const KEY_PREFIX: &str = "kb";
pub const API_KEY_TTL_SECS: u64 = 60 * 60 * 24 * 365;

pub fn generate_api_key(client_id: &str, tier: Tier) -> (String, ApiKeyRecord) {
    let mut random_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut random_bytes);
    let random_part = random_bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
    let key = format!("{KEY_PREFIX}_{}_{random_part}", tier.as_str());

    let now = Utc::now();
    let record = ApiKeyRecord {
        client_id: client_id.to_string(),
        tier,
        created_at: now,
        expires_at: now + Duration::days(365),
        rate_limit_override: None,
        permissions: tier.permissions().into_iter().map(String::from).collect(),
    };
    (key, record)
}

pub fn storage_key(api_key: &str) -> String {
    format!("api_keys:{api_key}")
}

/// Grounded on `mask_api_key`: keeps the prefix/tier visible, redacts the
/// random suffix for logging.
pub fn mask_api_key(api_key: &str) -> String {
    if api_key.is_empty() {
        return "none".to_string();
    }
    let parts: Vec<&str> = api_key.split('_').collect();
    if parts.len() >= 3 {
        let secret = parts[2];
        let visible = secret.chars().take(4).collect::<String>();
        let masked = "*".repeat(secret.len().saturating_sub(4));
        format!("{}_{}_{visible}{masked}", parts[0], parts[1])
    } else {
        let visible = api_key.chars().take(4).collect::<String>();
        format!("{visible}{}", "*".repeat(api_key.len().saturating_sub(4)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_carries_tier_in_prefix() {
        let (key, record) = generate_api_key("acme", Tier::Pro);
        assert!(key.starts_with("kb_pro_"));
        assert_eq!(record.tier.as_str(), "pro");
        assert!(record.permissions.contains(&"webhook".to_string()));
    }

    #[test]
    fn masking_preserves_prefix_and_tier() {
        let masked = mask_api_key("kb_pro_deadbeefcafebabe");
        assert!(masked.starts_with("kb_pro_dead"));
        assert!(masked.contains('*'));
    }

    #[test]
    fn masking_empty_key_is_none() {
        assert_eq!(mask_api_key(""), "none");
    }
}
