//! Configuration surface: a YAML document layered with environment
//! overrides of the form `KB__SECTION__KEY` (double underscore nesting,
//! generalizing the `ADSDOG__PAGINATE__DEFAULT` convention), covering the
//! sections named in spec.md §6.
//!
//! Precedence: built-in defaults < YAML file < environment. A missing
//! collaborator endpoint required at startup surfaces as [`KbError::Fatal`].

use crate::error::{KbError, KbResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_max_attachment_size")]
    pub max_attachment_size: u64,
    #[serde(default)]
    pub company_domains: Vec<String>,
}

fn default_port() -> u16 {
    8080
}
fn default_env() -> String {
    "development".to_string()
}
fn default_timezone() -> String {
    "Asia/Singapore".to_string()
}
fn default_max_attachment_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            env: default_env(),
            timezone: default_timezone(),
            max_attachment_size: default_max_attachment_size(),
            company_domains: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierLimits {
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,
    #[serde(default = "default_concurrent")]
    pub max_concurrent: u32,
}

fn default_rpm() -> u32 {
    60
}
fn default_concurrent() -> u32 {
    5
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            requests_per_minute: default_rpm(),
            max_concurrent: default_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitsSection {
    #[serde(default)]
    pub tiers: BTreeMap<String, TierLimits>,
}

impl Default for RateLimitsSection {
    fn default() -> Self {
        let mut tiers = BTreeMap::new();
        tiers.insert(
            "free".to_string(),
            TierLimits { requests_per_minute: 20, max_concurrent: 2 },
        );
        tiers.insert(
            "pro".to_string(),
            TierLimits { requests_per_minute: 120, max_concurrent: 10 },
        );
        tiers.insert(
            "enterprise".to_string(),
            TierLimits { requests_per_minute: 600, max_concurrent: 50 },
        );
        Self { tiers }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenAiSection {
    #[serde(default)]
    pub model_choices: Vec<String>,
    #[serde(default)]
    pub fallback_model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens_per_request: u32,
    #[serde(default)]
    pub monthly_cost_limit: Option<f64>,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_max_tokens() -> u32 {
    4096
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RedisSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
}

impl RedisSection {
    /// Builds a `redis://` connection URL from the section, or `None` when
    /// no host is configured (the binaries fall back to in-memory backends).
    pub fn url(&self) -> Option<String> {
        let host = self.host.as_ref()?;
        let port = self.port.unwrap_or(6379);
        match &self.password {
            Some(password) => Some(format!("redis://:{password}@{host}:{port}")),
            None => Some(format!("redis://{host}:{port}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PostgresSection {
    pub database_url: Option<String>,
    #[serde(default)]
    pub echo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantSection {
    pub host: Option<String>,
    #[serde(default = "default_qdrant_port")]
    pub port: u16,
    pub api_key: Option<String>,
    #[serde(default = "default_qdrant_timeout")]
    pub timeout: u64,
    #[serde(default = "default_qdrant_collection")]
    pub collection_name: String,
}

fn default_qdrant_port() -> u16 {
    6333
}
fn default_qdrant_timeout() -> u64 {
    30
}
fn default_qdrant_collection() -> String {
    "email_knowledge".to_string()
}

impl Default for QdrantSection {
    fn default() -> Self {
        Self {
            host: None,
            port: default_qdrant_port(),
            api_key: None,
            timeout: default_qdrant_timeout(),
            collection_name: default_qdrant_collection(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BeatTask {
    pub task: String,
    pub schedule: f64,
    pub queue: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CelerySection {
    pub broker_url: Option<String>,
    pub result_backend: Option<String>,
    #[serde(default)]
    pub beat_schedule: BTreeMap<String, BeatTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSection {
    #[serde(default)]
    pub enabled: bool,
    pub url: Option<String>,
    #[serde(default = "default_webhook_timeout")]
    pub timeout: u64,
    pub auth_token: Option<String>,
}

fn default_webhook_timeout() -> u64 {
    10
}

impl Default for WebhookSection {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            timeout: default_webhook_timeout(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogFileSection {
    pub path: Option<String>,
    #[serde(default = "default_log_max_size")]
    pub max_size: u64,
    #[serde(default = "default_log_backups")]
    pub backup_count: u32,
}

fn default_log_max_size() -> u64 {
    10 * 1024 * 1024
}
fn default_log_backups() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmailSection {
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmsSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    pub service: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationsSection {
    #[serde(default)]
    pub log_file: LogFileSection,
    #[serde(default)]
    pub email: EmailSection,
    #[serde(default)]
    pub sms: SmsSection,
}

/// Which notifier variant to construct (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Webhook,
    Email,
    Sms,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecuritySection {
    pub encryption_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

/// The full configuration document (spec.md §6 "Configuration surface").
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub rate_limits: RateLimitsSection,
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub redis: RedisSection,
    #[serde(default)]
    pub postgres: PostgresSection,
    #[serde(default)]
    pub qdrant: QdrantSection,
    #[serde(default)]
    pub celery: CelerySection,
    #[serde(default)]
    pub webhook: WebhookSection,
    #[serde(default)]
    pub security: SecuritySection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub notifications: NotificationsSection,
}

impl AppConfig {
    /// Load defaults, layer the YAML file at `path` if it exists, then
    /// apply `KB__SECTION__KEY` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> KbResult<Self> {
        let mut value = serde_yaml::to_value(AppConfig::default())
            .map_err(|e| KbError::fatal(format!("default config serialization: {e}")))?;

        let path = path.as_ref();
        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| KbError::fatal(format!("reading {}: {e}", path.display())))?;
            let file_value: serde_yaml::Value = serde_yaml::from_str(&raw)
                .map_err(|e| KbError::fatal(format!("parsing {}: {e}", path.display())))?;
            merge_yaml(&mut value, file_value);
        }

        apply_env_overrides(&mut value, "KB__");

        serde_yaml::from_value(value).map_err(|e| KbError::fatal(format!("invalid config: {e}")))
    }

    /// Load from the `KB_CONFIG_PATH` environment variable, defaulting to
    /// `config.yaml` in the working directory.
    pub fn load_default() -> KbResult<Self> {
        let path = std::env::var("KB_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load(path)
    }
}

fn merge_yaml(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value;
        }
    }
}

/// Apply `KB__SECTION__KEY` style overrides onto a YAML mapping, nesting on
/// each `__` segment and parsing the leaf as a YAML scalar so numbers/bools
/// round-trip (not just strings).
fn apply_env_overrides(value: &mut serde_yaml::Value, prefix: &str) {
    if !value.is_mapping() {
        *value = serde_yaml::Value::Mapping(Default::default());
    }
    for (key, raw) in std::env::vars() {
        let Some(stripped) = key.strip_prefix(prefix) else { continue };
        let path: Vec<String> = stripped.split("__").map(|s| s.to_lowercase()).collect();
        if path.is_empty() {
            continue;
        }
        set_path(value, &path, &raw);
    }
}

fn set_path(value: &mut serde_yaml::Value, path: &[String], raw: &str) {
    let serde_yaml::Value::Mapping(map) = value else { return };
    let key = serde_yaml::Value::String(path[0].clone());
    if path.len() == 1 {
        let parsed = serde_yaml::from_str::<serde_yaml::Value>(raw)
            .unwrap_or_else(|_| serde_yaml::Value::String(raw.to_string()));
        map.insert(key, parsed);
        return;
    }
    let entry = map
        .entry(key)
        .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
    if !entry.is_mapping() {
        *entry = serde_yaml::Value::Mapping(Default::default());
    }
    set_path(entry, &path[1..], raw);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn loads_defaults_without_a_file() {
        let cfg = AppConfig::load("/nonexistent/path.yaml").unwrap();
        assert_eq!(cfg.app.port, 8080);
        assert_eq!(cfg.rate_limits.tiers.get("free").unwrap().requests_per_minute, 20);
    }

    #[test]
    fn env_override_wins_over_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("KB__APP__PORT", "9100");
        let cfg = AppConfig::load("/nonexistent/path.yaml").unwrap();
        std::env::remove_var("KB__APP__PORT");
        assert_eq!(cfg.app.port, 9100);
    }
}
