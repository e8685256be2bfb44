//! Grounded on `DefaultWebhookNotifier.send_notification`: logs the
//! request URL and a truncated body, no internal retry.

use crate::notifier::Notifier;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info};

const LOG_BODY_TRUNCATE: usize = 1000;

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    enabled: bool,
    auth_token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: String, enabled: bool, timeout_secs: u64, auth_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, url, enabled, auth_token }
    }
}

fn truncate_for_log(body: &str) -> String {
    if body.len() > LOG_BODY_TRUNCATE {
        format!("{}...", &body[..LOG_BODY_TRUNCATE])
    } else {
        body.to_string()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, data: &serde_json::Value, job_id: &str, trace_id: &str) {
        if !self.enabled || self.url.is_empty() {
            info!(job_id, trace_id, "webhook not enabled, skipping notification");
            return;
        }

        let body = data.to_string();
        info!(job_id, trace_id, url = %self.url, body = %truncate_for_log(&body), "sending webhook notification");

        let mut request = self.client.post(&self.url).json(data);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                if status.is_success() {
                    info!(job_id, trace_id, %status, "webhook notification sent successfully");
                } else {
                    error!(job_id, trace_id, %status, body = %truncate_for_log(&text), "webhook notification returned non-2xx");
                }
            }
            Err(err) => {
                error!(job_id, trace_id, error = %err, "error sending webhook notification");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_bodies_for_logging() {
        let long = "x".repeat(2000);
        assert_eq!(truncate_for_log(&long).len(), LOG_BODY_TRUNCATE + 3);
    }

    #[test]
    fn short_bodies_are_unchanged() {
        assert_eq!(truncate_for_log("short"), "short");
    }
}
