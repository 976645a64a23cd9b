//! Provider boundary for push delivery.
//!
//! Everything above this trait is provider-agnostic. Only two primitives are
//! required; a bulk send is optional and only used when a provider offers it.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::notification::{DataPayload, Message};

/// Errors raised while constructing a provider handle.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Settings are missing or inconsistent
    #[error("Provider configuration error: {0}")]
    Configuration(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result of a single send to one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SendOutcome {
    /// Accepted by the provider
    Delivered,
    /// Token is unregistered, or the topic has no subscribers
    NotFound,
    /// Rejected by the provider
    Failed(String),
    /// No answer within the send timeout
    TimedOut,
    /// The provider could not be reached at all
    Unavailable(String),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, SendOutcome::Unavailable(_))
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            SendOutcome::Delivered => "delivered",
            SendOutcome::NotFound => "not_found",
            SendOutcome::Failed(_) => "failed",
            SendOutcome::TimedOut => "timed_out",
            SendOutcome::Unavailable(_) => "unavailable",
        }
    }
}

/// Push delivery provider.
///
/// Constructed once at startup and injected into the dispatcher. Sends report
/// their outcome as a value; a provider never fails the surrounding batch.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Provider identifier for logs and errors
    fn name(&self) -> &'static str;

    /// Whether the provider can accept sends at all
    fn is_available(&self) -> bool {
        true
    }

    /// Send to one device token.
    async fn send_to_token(&self, token: &str, message: &Message, data: &DataPayload) -> SendOutcome;

    /// Send to every device subscribed to a topic.
    async fn send_to_topic(&self, topic: &str, message: &Message, data: &DataPayload) -> SendOutcome;

    /// Send to many tokens with a single provider call.
    ///
    /// Providers with a native multicast API return one outcome per token, in
    /// input order. The default `None` makes the dispatcher fall back to
    /// per-token sends.
    async fn send_to_tokens(
        &self,
        _tokens: &[String],
        _message: &Message,
        _data: &DataPayload,
    ) -> Option<Vec<SendOutcome>> {
        None
    }
}
