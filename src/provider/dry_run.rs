//! Providers that do not talk to a real push service

use async_trait::async_trait;

use crate::notification::{DataPayload, Message};
use crate::registry::redact_token;

use super::backend::{PushProvider, SendOutcome};

/// Dry-run provider: logs every send and reports it delivered.
#[derive(Debug, Default)]
pub struct LogPushProvider;

impl LogPushProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushProvider for LogPushProvider {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send_to_token(&self, token: &str, message: &Message, data: &DataPayload) -> SendOutcome {
        tracing::info!(
            token = %redact_token(token),
            title = %message.title,
            data_keys = data.len(),
            "Push send (dry run)"
        );
        SendOutcome::Delivered
    }

    async fn send_to_topic(&self, topic: &str, message: &Message, data: &DataPayload) -> SendOutcome {
        tracing::info!(
            topic = %topic,
            title = %message.title,
            data_keys = data.len(),
            "Topic send (dry run)"
        );
        SendOutcome::Delivered
    }
}

/// Placeholder for a deployment with no push provider configured.
///
/// Reports itself unavailable so dispatches fail loudly instead of returning
/// zero-count results.
#[derive(Debug, Default)]
pub struct UnconfiguredPushProvider;

#[async_trait]
impl PushProvider for UnconfiguredPushProvider {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn send_to_token(&self, _token: &str, _message: &Message, _data: &DataPayload) -> SendOutcome {
        SendOutcome::Failed("push provider not configured".to_string())
    }

    async fn send_to_topic(&self, _topic: &str, _message: &Message, _data: &DataPayload) -> SendOutcome {
        SendOutcome::Failed("push provider not configured".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_provider_delivers() {
        let provider = LogPushProvider::new();
        let message = Message::new("t", "b");
        let outcome = provider
            .send_to_token("abcdef0123456789", &message, &DataPayload::new())
            .await;
        assert_eq!(outcome, SendOutcome::Delivered);
        assert!(provider.is_available());
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let provider = UnconfiguredPushProvider;
        assert!(!provider.is_available());
        let outcome = provider
            .send_to_topic("tenant_1", &Message::new("t", "b"), &DataPayload::new())
            .await;
        assert!(matches!(outcome, SendOutcome::Failed(_)));
    }
}
