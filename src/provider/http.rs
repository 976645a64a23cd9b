//! HTTP push provider speaking an FCM-style JSON API.
//!
//! Each send posts one message:
//!
//! ```json
//! {"message": {"token": "...", "notification": {"title": "...", "body": "..."}, "data": {}}}
//! ```
//!
//! Topic sends carry `"topic"` instead of `"token"`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::config::ProviderConfig;
use crate::notification::{DataPayload, Message};
use crate::registry::redact_token;

use super::backend::{ProviderError, PushProvider, SendOutcome};

/// Longest provider error body kept in a failure reason
const MAX_REASON_LEN: usize = 200;

/// Where a single message is addressed
#[derive(Debug, Clone, Copy)]
enum PushAddress<'a> {
    Token(&'a str),
    Topic(&'a str),
}

/// Push provider posting to an HTTP endpoint with bearer authentication.
pub struct HttpPushProvider {
    client: Client,
    send_url: String,
    api_key: Option<String>,
}

impl HttpPushProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Configuration("provider.endpoint is required for http".to_string())
            })?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            send_url: format!("{}/messages:send", endpoint.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    pub fn send_url(&self) -> &str {
        &self.send_url
    }

    async fn post(&self, address: PushAddress<'_>, message: &Message, data: &DataPayload) -> SendOutcome {
        let body = build_payload(address, message, data);

        let mut request = self.client.post(&self.send_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    SendOutcome::Delivered
                } else if status == StatusCode::NOT_FOUND {
                    SendOutcome::NotFound
                } else {
                    let text = response.text().await.unwrap_or_default();
                    SendOutcome::Failed(failure_reason(status, &text))
                }
            }
            Err(e) if e.is_timeout() => SendOutcome::TimedOut,
            Err(e) if e.is_connect() => SendOutcome::Unavailable(e.to_string()),
            Err(e) => SendOutcome::Failed(e.to_string()),
        }
    }
}

#[async_trait]
impl PushProvider for HttpPushProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send_to_token(&self, token: &str, message: &Message, data: &DataPayload) -> SendOutcome {
        let outcome = self.post(PushAddress::Token(token), message, data).await;
        if !outcome.is_delivered() {
            tracing::debug!(token = %redact_token(token), outcome = ?outcome, "Token send not delivered");
        }
        outcome
    }

    async fn send_to_topic(&self, topic: &str, message: &Message, data: &DataPayload) -> SendOutcome {
        self.post(PushAddress::Topic(topic), message, data).await
    }
}

fn build_payload(address: PushAddress<'_>, message: &Message, data: &DataPayload) -> Value {
    let mut body = json!({
        "notification": {
            "title": message.title,
            "body": message.body,
        },
        "data": data,
    });

    match address {
        PushAddress::Token(token) => body["token"] = Value::String(token.to_string()),
        PushAddress::Topic(topic) => body["topic"] = Value::String(topic.to_string()),
    }

    json!({ "message": body })
}

fn failure_reason(status: StatusCode, body: &str) -> String {
    let trimmed: String = body.trim().chars().take(MAX_REASON_LEN).collect();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), trimmed)
    }
}
