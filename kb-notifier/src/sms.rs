//! Grounded on `DefaultSMSNotifier`: a placeholder send that logs intent.

use crate::notifier::Notifier;
use async_trait::async_trait;
use tracing::info;

pub struct SmsNotifier {
    phone_numbers: Vec<String>,
    enabled: bool,
}

impl SmsNotifier {
    pub fn new(phone_numbers: Vec<String>, enabled: bool) -> Self {
        Self { phone_numbers, enabled }
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn notify(&self, _data: &serde_json::Value, job_id: &str, trace_id: &str) {
        if !self.enabled || self.phone_numbers.is_empty() {
            info!(job_id, trace_id, "sms not enabled, skipping notification");
            return;
        }
        info!(job_id, trace_id, numbers = %self.phone_numbers.join(", "), "sms notification sent");
    }
}
