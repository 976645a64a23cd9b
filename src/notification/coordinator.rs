//! Fallback coordinator: the single dispatch entry point.

use std::sync::Arc;
use std::time::Instant;

use crate::metrics::DispatchMetrics;
use crate::provider::SendOutcome;

use super::aggregator::{DeliveryAggregator, DispatchReport};
use super::dispatcher::{DeliveryDispatcher, Outcome};
use super::resolver::{AudienceResolver, AudienceSource};
use super::types::{DispatchError, Notification, RecipientSet};

/// Orchestrates resolution, delivery and aggregation for one notification.
///
/// Stateless between calls; concurrent dispatches share only read access to
/// the registry. Dispatching the same notification twice sends it twice.
pub struct FallbackCoordinator {
    resolver: AudienceResolver,
    dispatcher: Arc<DeliveryDispatcher>,
}

impl FallbackCoordinator {
    pub fn new(resolver: AudienceResolver, dispatcher: Arc<DeliveryDispatcher>) -> Self {
        Self {
            resolver,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Arc<DeliveryDispatcher> {
        &self.dispatcher
    }

    /// Resolve, deliver and summarize a notification.
    ///
    /// Returns only after every attempted channel completed. A malformed
    /// selector fails the call, as does a provider that is unconfigured or
    /// unreachable for every send. An empty audience is a completed dispatch
    /// with zero counts.
    #[tracing::instrument(
        name = "coordinator.dispatch",
        skip(self, notification),
        fields(
            notification_id = %notification.id,
            tenant_id = %notification.tenant_id,
            kind = %notification.kind()
        )
    )]
    pub async fn dispatch(&self, notification: &Notification) -> Result<DispatchReport, DispatchError> {
        let started = Instant::now();
        let kind = notification.kind();

        let report = match self.run(notification).await {
            Ok(report) => report,
            Err(e) => {
                DispatchMetrics::record_error(&e);
                match &e {
                    DispatchError::ProviderUnavailable(_) | DispatchError::Registry(_) => {
                        tracing::error!(error = %e, "Dispatch failed")
                    }
                    DispatchError::InvalidSelector(_) => {
                        tracing::warn!(error = %e, "Dispatch rejected")
                    }
                }
                return Err(e);
            }
        };

        DispatchMetrics::record_dispatch(kind, &report.result, started.elapsed());

        tracing::info!(
            channel = report.result.channel_attempted.as_str(),
            success_count = report.result.success_count,
            failure_count = report.result.failure_count,
            fallback_used = report.result.fallback_used,
            attempts = report.attempts.len(),
            errors = ?report.result.errors,
            "Notification dispatched"
        );

        Ok(report)
    }

    async fn run(&self, notification: &Notification) -> Result<DispatchReport, DispatchError> {
        notification.validate_selector()?;

        let provider = self.dispatcher.provider();
        if !provider.is_available() {
            return Err(DispatchError::ProviderUnavailable(format!(
                "provider '{}' is not configured",
                provider.name()
            )));
        }

        let resolution = self.resolver.resolve(notification).await?;
        let mut aggregator = DeliveryAggregator::new(notification.id);

        for step in resolution.steps.iter().filter(|s| s.matched == 0) {
            aggregator.record_empty_lookup(step);
        }
        if resolution.escalated() {
            aggregator.mark_fallback();
        }

        match &resolution.recipients {
            RecipientSet::TokenList { tokens } if tokens.is_empty() => {
                tracing::debug!("Empty audience, nothing to send");
            }
            RecipientSet::TokenList { tokens } => {
                let outcomes = self
                    .dispatcher
                    .dispatch(&resolution.recipients, &notification.message, &notification.data)
                    .await;
                self.ensure_reachable(&outcomes)?;
                let label = resolution
                    .steps
                    .last()
                    .map(|s| s.label.clone())
                    .unwrap_or_else(|| format!("{} tokens", tokens.len()));
                aggregator.record(resolution.source, label, &resolution.recipients, &outcomes);
            }
            RecipientSet::Topic { .. } => {
                // Walk every accepted naming convention until one reaches someone
                for topic in self.resolver.topic_candidates(&notification.tenant_id) {
                    let recipients = RecipientSet::topic(topic.clone());
                    let outcomes = self
                        .dispatcher
                        .dispatch(&recipients, &notification.message, &notification.data)
                        .await;
                    self.ensure_reachable(&outcomes)?;
                    let attempt = aggregator.record(
                        AudienceSource::TopicBroadcast,
                        topic.clone(),
                        &recipients,
                        &outcomes,
                    );
                    if attempt.success_count > 0 {
                        tracing::debug!(topic = %topic, "Topic broadcast reached subscribers");
                        break;
                    }
                }
            }
        }

        Ok(aggregator.finish())
    }

    /// Fail the dispatch when not a single send got through to the provider
    fn ensure_reachable(&self, outcomes: &[Outcome]) -> Result<(), DispatchError> {
        if outcomes.is_empty() || !outcomes.iter().all(Outcome::is_unavailable) {
            return Ok(());
        }

        let detail = match &outcomes[0].result {
            SendOutcome::Unavailable(reason) => reason.as_str(),
            _ => "no response",
        };
        Err(DispatchError::ProviderUnavailable(format!(
            "provider '{}' is unreachable: {}",
            self.dispatcher.provider().name(),
            detail
        )))
    }
}
