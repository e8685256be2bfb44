//! Grounded on `DefaultEmailNotifier`: a placeholder send that logs intent,
//! matching the original's unimplemented delivery path.

use crate::notifier::Notifier;
use async_trait::async_trait;
use tracing::info;

pub struct EmailNotifier {
    recipients: Vec<String>,
    subject: String,
}

impl EmailNotifier {
    pub fn new(recipients: Vec<String>, subject: String) -> Self {
        Self { recipients, subject }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, _data: &serde_json::Value, job_id: &str, trace_id: &str) {
        if self.recipients.is_empty() {
            info!(job_id, trace_id, "no email recipients configured, skipping notification");
            return;
        }
        info!(
            job_id,
            trace_id,
            recipients = %self.recipients.join(", "),
            subject = %self.subject,
            "email notification sent"
        );
    }
}
