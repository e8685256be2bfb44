//! The chat/LLM provider is an external collaborator (spec.md §1). This
//! trait is the seam; [`RotatingLlmProvider`] adds the key-rotation and
//! monthly-cost-gate behavior grounded on `app/services/openai_service.py`'s
//! `OpenAIKeyManager` / `OpenAICostTracker`, backed by `kb-cache` instead of
//! a direct Redis client.

use async_trait::async_trait;
use kb_cache::TwoTierCache;
use kb_core::{KbError, KbResult};
use std::sync::Arc;
use tracing::warn;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Runs a single chat completion call with a system prompt and user
    /// content, expected to return a JSON object as text.
    async fn complete_json(&self, system_prompt: &str, user_content: &str) -> KbResult<String>;
}

/// Rotates through an ordered list of (key, model) pairs, skipping any key
/// that `kb-cache` has marked rate-limited, and refuses new calls once the
/// monthly cost ledger exceeds the configured limit.
pub struct RotatingLlmProvider<C: LlmClient> {
    client: C,
    model_choices: Vec<String>,
    cache: Arc<TwoTierCache>,
    monthly_cost_limit: f64,
}

/// The raw network call, separated from rotation/cost-gate bookkeeping so
/// it can be mocked in tests without faking HTTP.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat_json(&self, model: &str, system_prompt: &str, user_content: &str) -> KbResult<String>;
}

const RATE_LIMIT_MARK_SECS: i64 = 60;
const COST_KEY: &str = "openai:monthly_cost";
const COST_PER_1K_TOKENS_DEFAULT: f64 = 0.01;

impl<C: LlmClient> RotatingLlmProvider<C> {
    pub fn new(client: C, model_choices: Vec<String>, cache: Arc<TwoTierCache>, monthly_cost_limit: f64) -> Self {
        Self { client, model_choices, cache, monthly_cost_limit }
    }

    async fn monthly_cost(&self) -> f64 {
        self.cache
            .get(COST_KEY)
            .await
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    }

    async fn record_cost(&self, tokens_estimate: usize) {
        let cost = (tokens_estimate as f64 / 1000.0) * COST_PER_1K_TOKENS_DEFAULT;
        let _ = self.cache.incrbyfloat(COST_KEY, cost).await;
    }
}

#[async_trait]
impl<C: LlmClient> LlmProvider for RotatingLlmProvider<C> {
    async fn complete_json(&self, system_prompt: &str, user_content: &str) -> KbResult<String> {
        if self.monthly_cost().await >= self.monthly_cost_limit {
            return Err(KbError::RateLimited { retry_after_secs: RATE_LIMIT_MARK_SECS as u64 });
        }

        let mut last_err = None;
        for model in &self.model_choices {
            let limited_key = format!("openai_limited:{model}");
            if self.cache.get(&limited_key).await.ok().flatten().is_some() {
                continue;
            }

            match self.client.chat_json(model, system_prompt, user_content).await {
                Ok(text) => {
                    self.record_cost(user_content.len() / 4).await;
                    return Ok(text);
                }
                Err(err) if err.is_retryable() => {
                    warn!(model, "llm call rate limited, marking key and rotating");
                    let _ = self.cache.setex(&limited_key, RATE_LIMIT_MARK_SECS as u64, "1").await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| KbError::transient("no model choices configured")))
    }
}

/// Deterministic provider for tests and local development, matching
/// `app/services/mock_service.py`'s role as a stand-in for the real model.
pub struct MockLlmProvider {
    pub response: String,
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete_json(&self, _system_prompt: &str, _user_content: &str) -> KbResult<String> {
        Ok(self.response.clone())
    }
}
