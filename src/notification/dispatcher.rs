use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;

use crate::config::DispatchConfig;
use crate::metrics::DispatchMetrics;
use crate::provider::{PushProvider, SendOutcome};
use crate::registry::redact_token;

use super::types::{Channel, DataPayload, Message, RecipientSet};

/// Default number of tokens handled per pass
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default maximum number of concurrent token sends
const DEFAULT_MAX_CONCURRENT_SENDS: usize = 100;

/// Default per-send timeout
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one send to one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub channel: Channel,
    /// Token or topic name the send went to
    pub endpoint: String,
    pub result: SendOutcome,
}

impl Outcome {
    /// Whether this send counts towards the success total
    pub fn is_success(&self) -> bool {
        self.result.is_delivered()
    }

    /// Whether the provider could not be reached for this send
    pub fn is_unavailable(&self) -> bool {
        self.result.is_unavailable()
    }

    /// Whether this send counts towards the failure total.
    ///
    /// A topic with no subscribers is neither a success nor a failure.
    pub fn is_failure(&self) -> bool {
        match (&self.channel, &self.result) {
            (_, SendOutcome::Delivered) => false,
            (Channel::Topic, SendOutcome::NotFound) => false,
            _ => true,
        }
    }
}

/// Statistics for the delivery dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Token-list dispatches
    pub token_list_dispatches: AtomicU64,
    /// Topic dispatches
    pub topic_dispatches: AtomicU64,
    /// Individual sends delivered
    pub delivered: AtomicU64,
    /// Individual sends not delivered (includes timeouts)
    pub failed: AtomicU64,
    /// Individual sends that hit the timeout
    pub timed_out: AtomicU64,
    /// Chunks handed to a provider bulk primitive
    pub bulk_chunks: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            token_list_dispatches: self.token_list_dispatches.load(Ordering::Relaxed),
            topic_dispatches: self.topic_dispatches.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            bulk_chunks: self.bulk_chunks.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &Outcome) {
        match &outcome.result {
            SendOutcome::Delivered => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            SendOutcome::TimedOut => {
                self.timed_out.fetch_add(1, Ordering::Relaxed);
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub token_list_dispatches: u64,
    pub topic_dispatches: u64,
    pub delivered: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub bulk_chunks: u64,
}

/// Sends a message to a resolved recipient set through the push provider.
///
/// Every endpoint's outcome is recorded independently; one bad token never
/// aborts the rest of the batch, and nothing is retried.
pub struct DeliveryDispatcher {
    provider: Arc<dyn PushProvider>,
    chunk_size: usize,
    max_concurrent_sends: usize,
    send_timeout: Duration,
    stats: DispatcherStats,
}

impl DeliveryDispatcher {
    /// Create a dispatcher with default limits
    pub fn new(provider: Arc<dyn PushProvider>) -> Self {
        Self {
            provider,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrent_sends: DEFAULT_MAX_CONCURRENT_SENDS,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            stats: DispatcherStats::default(),
        }
    }

    /// Create a dispatcher with limits from configuration
    pub fn with_config(provider: Arc<dyn PushProvider>, config: &DispatchConfig) -> Self {
        Self {
            provider,
            chunk_size: config.chunk_size.max(1),
            max_concurrent_sends: config.max_concurrent_sends.max(1),
            send_timeout: Duration::from_millis(config.send_timeout_ms),
            stats: DispatcherStats::default(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn PushProvider> {
        &self.provider
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Deliver a message to every endpoint of a recipient set.
    ///
    /// A topic yields exactly one outcome standing for the whole channel; a
    /// token list yields one outcome per token.
    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip(self, recipients, message, data),
        fields(channel = recipients.channel().as_str(), endpoints = recipients.len())
    )]
    pub async fn dispatch(
        &self,
        recipients: &RecipientSet,
        message: &Message,
        data: &DataPayload,
    ) -> Vec<Outcome> {
        let outcomes = match recipients {
            RecipientSet::Topic { name } => {
                self.stats.topic_dispatches.fetch_add(1, Ordering::Relaxed);
                vec![self.send_topic(name, message, data).await]
            }
            RecipientSet::TokenList { tokens } => {
                self.stats.token_list_dispatches.fetch_add(1, Ordering::Relaxed);
                self.send_token_list(tokens, message, data).await
            }
        };

        for outcome in &outcomes {
            self.stats.record(outcome);
        }

        outcomes
    }

    async fn send_topic(&self, topic: &str, message: &Message, data: &DataPayload) -> Outcome {
        let started = Instant::now();
        let result = match tokio::time::timeout(
            self.send_timeout,
            self.provider.send_to_topic(topic, message, data),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => SendOutcome::TimedOut,
        };
        DispatchMetrics::record_send(Channel::Topic, &result, started.elapsed());

        if result.is_delivered() {
            tracing::debug!(topic = %topic, "Topic send delivered");
        } else {
            tracing::warn!(topic = %topic, outcome = ?result, "Topic send not delivered");
        }

        Outcome {
            channel: Channel::Topic,
            endpoint: topic.to_string(),
            result,
        }
    }

    /// Send to a token list one chunk at a time and concatenate the outcomes
    async fn send_token_list(
        &self,
        tokens: &[String],
        message: &Message,
        data: &DataPayload,
    ) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(tokens.len());

        for (index, chunk) in tokens.chunks(self.chunk_size).enumerate() {
            let chunk_outcomes = match self.send_bulk(chunk, message, data).await {
                Some(bulk) => bulk,
                None => self.send_each(chunk, message, data).await,
            };

            tracing::trace!(
                chunk = index,
                chunk_len = chunk.len(),
                delivered = chunk_outcomes.iter().filter(|o| o.is_success()).count(),
                "Token chunk processed"
            );

            outcomes.extend(chunk_outcomes);
        }

        outcomes
    }

    /// Hand a chunk to the provider's bulk primitive, if it has one
    async fn send_bulk(
        &self,
        chunk: &[String],
        message: &Message,
        data: &DataPayload,
    ) -> Option<Vec<Outcome>> {
        let started = Instant::now();
        let results = match tokio::time::timeout(
            self.send_timeout,
            self.provider.send_to_tokens(chunk, message, data),
        )
        .await
        {
            Ok(Some(results)) => results,
            Ok(None) => return None,
            Err(_) => vec![SendOutcome::TimedOut; chunk.len()],
        };

        self.stats.bulk_chunks.fetch_add(1, Ordering::Relaxed);
        let elapsed = started.elapsed();

        if results.len() != chunk.len() {
            tracing::warn!(
                expected = chunk.len(),
                received = results.len(),
                provider = self.provider.name(),
                "Bulk send returned a mismatched outcome count"
            );
        }

        let mut results = results.into_iter();
        let outcomes = chunk
            .iter()
            .map(|token| {
                let result = results
                    .next()
                    .unwrap_or_else(|| SendOutcome::Failed("no outcome from bulk send".to_string()));
                DispatchMetrics::record_send(Channel::TokenList, &result, elapsed);
                Outcome {
                    channel: Channel::TokenList,
                    endpoint: token.clone(),
                    result,
                }
            })
            .collect();

        Some(outcomes)
    }

    /// Send to each token concurrently with bounded parallelism
    async fn send_each(&self, chunk: &[String], message: &Message, data: &DataPayload) -> Vec<Outcome> {
        let mut futures = FuturesUnordered::new();
        let mut outcomes = Vec::with_capacity(chunk.len());
        let mut pending = 0;

        for token in chunk {
            futures.push(self.send_token(token, message, data));
            pending += 1;

            // Drain completed sends when we hit the concurrency limit
            while pending >= self.max_concurrent_sends {
                match futures.next().await {
                    Some(outcome) => {
                        pending -= 1;
                        outcomes.push(outcome);
                    }
                    None => break,
                }
            }
        }

        while let Some(outcome) = futures.next().await {
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn send_token(&self, token: &str, message: &Message, data: &DataPayload) -> Outcome {
        let started = Instant::now();
        let result = match tokio::time::timeout(
            self.send_timeout,
            self.provider.send_to_token(token, message, data),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => SendOutcome::TimedOut,
        };
        DispatchMetrics::record_send(Channel::TokenList, &result, started.elapsed());

        if !result.is_delivered() {
            tracing::warn!(
                token = %redact_token(token),
                provider = self.provider.name(),
                outcome = ?result,
                "Token send failed"
            );
        }

        Outcome {
            channel: Channel::TokenList,
            endpoint: token.to_string(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use crate::provider::LogPushProvider;

    /// Records the highest number of sends in flight at once
    #[derive(Default)]
    struct InFlightProvider {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PushProvider for InFlightProvider {
        fn name(&self) -> &'static str {
            "in-flight"
        }

        async fn send_to_token(&self, _token: &str, _message: &Message, _data: &DataPayload) -> SendOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            SendOutcome::Delivered
        }

        async fn send_to_topic(&self, _topic: &str, _message: &Message, _data: &DataPayload) -> SendOutcome {
            SendOutcome::Delivered
        }
    }

    fn outcome(channel: Channel, result: SendOutcome) -> Outcome {
        Outcome {
            channel,
            endpoint: "e".to_string(),
            result,
        }
    }

    #[test]
    fn test_outcome_classification() {
        assert!(outcome(Channel::TokenList, SendOutcome::Delivered).is_success());
        assert!(outcome(Channel::TokenList, SendOutcome::NotFound).is_failure());
        assert!(outcome(Channel::TokenList, SendOutcome::TimedOut).is_failure());
        assert!(!outcome(Channel::Topic, SendOutcome::NotFound).is_failure());
        assert!(!outcome(Channel::Topic, SendOutcome::NotFound).is_success());
        assert!(outcome(Channel::Topic, SendOutcome::Failed("x".into())).is_failure());
        assert!(outcome(Channel::Topic, SendOutcome::Unavailable("x".into())).is_unavailable());
    }

    #[test]
    fn test_config_clamps_limits() {
        let config = DispatchConfig {
            chunk_size: 0,
            max_concurrent_sends: 0,
            ..Default::default()
        };
        let dispatcher = DeliveryDispatcher::with_config(Arc::new(LogPushProvider::new()), &config);
        assert_eq!(dispatcher.chunk_size(), 1);
        assert_eq!(dispatcher.max_concurrent_sends, 1);
    }

    #[tokio::test]
    async fn test_token_list_outcome_per_token() {
        let dispatcher = DeliveryDispatcher::new(Arc::new(LogPushProvider::new()));
        let tokens: Vec<String> = (0..7).map(|i| format!("tok-{}", i)).collect();

        let outcomes = dispatcher
            .dispatch(
                &RecipientSet::tokens(tokens),
                &Message::new("t", "b"),
                &DataPayload::new(),
            )
            .await;

        assert_eq!(outcomes.len(), 7);
        assert!(outcomes.iter().all(Outcome::is_success));

        let stats = dispatcher.stats();
        assert_eq!(stats.token_list_dispatches, 1);
        assert_eq!(stats.delivered, 7);
    }

    #[tokio::test]
    async fn test_concurrent_sends_are_bounded() {
        let provider = Arc::new(InFlightProvider::default());
        let config = DispatchConfig {
            max_concurrent_sends: 3,
            ..Default::default()
        };
        let dispatcher = DeliveryDispatcher::with_config(provider.clone(), &config);
        let tokens: Vec<String> = (0..20).map(|i| format!("tok-{}", i)).collect();

        let outcomes = dispatcher
            .dispatch(
                &RecipientSet::tokens(tokens),
                &Message::new("t", "b"),
                &DataPayload::new(),
            )
            .await;

        assert_eq!(outcomes.len(), 20);
        let peak = provider.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight sends {}", peak);
        assert!(peak > 1, "sends never overlapped");
    }

    #[tokio::test]
    async fn test_topic_single_outcome() {
        let dispatcher = DeliveryDispatcher::new(Arc::new(LogPushProvider::new()));
        let outcomes = dispatcher
            .dispatch(
                &RecipientSet::topic("tenant_school-1"),
                &Message::new("t", "b"),
                &DataPayload::new(),
            )
            .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].channel, Channel::Topic);
        assert_eq!(outcomes[0].endpoint, "tenant_school-1");
        assert_eq!(dispatcher.stats().topic_dispatches, 1);
    }

    #[tokio::test]
    async fn test_empty_token_list() {
        let dispatcher = DeliveryDispatcher::new(Arc::new(LogPushProvider::new()));
        let outcomes = dispatcher
            .dispatch(
                &RecipientSet::tokens(vec![]),
                &Message::new("t", "b"),
                &DataPayload::new(),
            )
            .await;
        assert!(outcomes.is_empty());
    }
}
