//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use crate::notification::{Channel, DeliveryResult, DispatchError, ErrorKind, NotificationKind};
use crate::provider::SendOutcome;

use super::{
    DEVICE_TOKENS_ACTIVE, DEVICE_TOKENS_REGISTERED, DISPATCH_DURATION, DISPATCH_ERRORS_TOTAL,
    EMPTY_AUDIENCE_TOTAL, ENDPOINT_SENDS_TOTAL, FALLBACKS_TOTAL, NOTIFICATIONS_DISPATCHED_TOTAL,
    SEND_LATENCY, TOKEN_REGISTRATIONS_TOTAL, TRIGGER_MESSAGES_RECEIVED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record one provider call
    pub fn record_send(channel: Channel, outcome: &SendOutcome, latency: Duration) {
        ENDPOINT_SENDS_TOTAL
            .with_label_values(&[channel.as_str(), outcome.label()])
            .inc();
        SEND_LATENCY
            .with_label_values(&[channel.as_str()])
            .observe(latency.as_secs_f64());
    }

    /// Record a completed dispatch
    pub fn record_dispatch(kind: NotificationKind, result: &DeliveryResult, elapsed: Duration) {
        let kind = kind.as_str();
        NOTIFICATIONS_DISPATCHED_TOTAL.with_label_values(&[kind]).inc();
        if result.fallback_used {
            FALLBACKS_TOTAL.with_label_values(&[kind]).inc();
        }
        if result.errors.contains(&ErrorKind::EmptyAudience) {
            EMPTY_AUDIENCE_TOTAL.with_label_values(&[kind]).inc();
        }
        DISPATCH_DURATION.observe(elapsed.as_secs_f64());
    }

    /// Record a dispatch that failed before completing
    pub fn record_error(error: &DispatchError) {
        let label = error.kind().map(|k| k.as_str()).unwrap_or("REGISTRY_ERROR");
        DISPATCH_ERRORS_TOTAL.with_label_values(&[label]).inc();
    }

    /// Record a notification received from the Redis trigger
    pub fn record_trigger_received() {
        TRIGGER_MESSAGES_RECEIVED.inc();
    }
}

/// Helper struct for recording registry metrics
pub struct RegistryMetrics;

impl RegistryMetrics {
    /// Record an upsert; `inserted` is false when an existing record was updated
    pub fn record_registration(inserted: bool) {
        let result = if inserted { "inserted" } else { "updated" };
        TOKEN_REGISTRATIONS_TOTAL.with_label_values(&[result]).inc();
    }

    /// Update token gauges (call before scraping)
    pub fn set_token_counts(total: usize, active: usize) {
        DEVICE_TOKENS_REGISTERED.set(total as i64);
        DEVICE_TOKENS_ACTIVE.set(active as i64);
    }
}
