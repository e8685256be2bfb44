//! Grounded on `DefaultNotifierFactory.get_notifier`.

use crate::email::EmailNotifier;
use crate::notifier::Notifier;
use crate::sms::SmsNotifier;
use crate::webhook::WebhookNotifier;
use kb_core::config::{AppConfig, NotificationKind};
use std::sync::Arc;

pub fn build_notifier(kind: NotificationKind, config: &AppConfig) -> Arc<dyn Notifier> {
    match kind {
        NotificationKind::Email => Arc::new(EmailNotifier::new(
            config.notifications.email.recipients.clone(),
            config.notifications.email.subject.clone(),
        )),
        NotificationKind::Sms => Arc::new(SmsNotifier::new(
            config.notifications.sms.phone_numbers.clone(),
            config.notifications.sms.enabled,
        )),
        NotificationKind::Webhook => Arc::new(WebhookNotifier::new(
            config.webhook.url.clone().unwrap_or_default(),
            config.webhook.enabled,
            config.webhook.timeout,
            config.webhook.auth_token.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_webhook_notifier_shape() {
        let config = AppConfig::default();
        let notifier = build_notifier(NotificationKind::Webhook, &config);
        let _: Arc<dyn Notifier> = notifier;
    }
}
