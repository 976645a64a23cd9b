//! Folds per-endpoint outcomes into a [`DeliveryResult`].
//!
//! Success is best effort: a dispatch that reached at least one endpoint is
//! successful even if others failed. Nothing here is persisted.

use serde::Serialize;
use uuid::Uuid;

use super::dispatcher::Outcome;
use super::resolver::{AudienceSource, ResolutionStep};
use super::types::{Channel, DeliveryResult, ErrorKind, RecipientSet};

/// One channel tried during a dispatch, including empty lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelAttempt {
    pub source: AudienceSource,
    pub channel: Channel,
    /// Topic name, or a description of the token lookup
    pub target: String,
    /// Endpoints addressed; zero for a lookup that found nothing
    pub endpoints: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

/// Final result plus the attempt history behind it
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    #[serde(flatten)]
    pub result: DeliveryResult,
    pub attempts: Vec<ChannelAttempt>,
}

/// Count (successes, failures) in a batch of outcomes
pub fn tally(outcomes: &[Outcome]) -> (usize, usize) {
    outcomes.iter().fold((0, 0), |(ok, failed), outcome| {
        (
            ok + outcome.is_success() as usize,
            failed + outcome.is_failure() as usize,
        )
    })
}

/// Fold a single batch of outcomes into a result
pub fn aggregate(notification_id: Uuid, channel: Channel, outcomes: &[Outcome]) -> DeliveryResult {
    let (success_count, failure_count) = tally(outcomes);
    DeliveryResult {
        notification_id,
        channel_attempted: channel,
        success_count,
        failure_count,
        fallback_used: false,
        errors: classify(success_count, failure_count),
        success: success_count > 0,
    }
}

fn classify(success_count: usize, failure_count: usize) -> Vec<ErrorKind> {
    match (success_count, failure_count) {
        (0, 0) => vec![ErrorKind::EmptyAudience],
        (0, _) => vec![ErrorKind::DeliveryFailed],
        (_, 0) => Vec::new(),
        _ => vec![ErrorKind::PartialDeliveryFailure],
    }
}

/// Accumulates attempts across every channel tried for one notification
#[derive(Debug)]
pub struct DeliveryAggregator {
    notification_id: Uuid,
    attempts: Vec<ChannelAttempt>,
    fallback_used: bool,
}

impl DeliveryAggregator {
    pub fn new(notification_id: Uuid) -> Self {
        Self {
            notification_id,
            attempts: Vec::new(),
            fallback_used: false,
        }
    }

    /// Record a lookup that produced no endpoints
    pub fn record_empty_lookup(&mut self, step: &ResolutionStep) {
        self.attempts.push(ChannelAttempt {
            source: step.source,
            channel: Channel::TokenList,
            target: step.label.clone(),
            endpoints: 0,
            success_count: 0,
            failure_count: 0,
        });
    }

    /// Record one dispatch against a recipient set
    pub fn record(
        &mut self,
        source: AudienceSource,
        target: impl Into<String>,
        recipients: &RecipientSet,
        outcomes: &[Outcome],
    ) -> &ChannelAttempt {
        let (success_count, failure_count) = tally(outcomes);
        self.attempts.push(ChannelAttempt {
            source,
            channel: recipients.channel(),
            target: target.into(),
            endpoints: recipients.len(),
            success_count,
            failure_count,
        });
        &self.attempts[self.attempts.len() - 1]
    }

    pub fn mark_fallback(&mut self) {
        self.fallback_used = true;
    }

    /// Sum every attempt into the final report
    pub fn finish(self) -> DispatchReport {
        let success_count: usize = self.attempts.iter().map(|a| a.success_count).sum();
        let failure_count: usize = self.attempts.iter().map(|a| a.failure_count).sum();
        let channel_attempted = self
            .attempts
            .last()
            .map(|a| a.channel)
            .unwrap_or(Channel::TokenList);

        DispatchReport {
            result: DeliveryResult {
                notification_id: self.notification_id,
                channel_attempted,
                success_count,
                failure_count,
                fallback_used: self.fallback_used,
                errors: classify(success_count, failure_count),
                success: success_count > 0,
            },
            attempts: self.attempts,
        }
    }
}
