//! Prometheus metrics for the notification service.
//!
//! - Dispatch metrics (notifications by kind, fallbacks, empty audiences, errors)
//! - Delivery metrics (per-endpoint sends by channel and outcome, latency)
//! - Registry metrics (registrations, token counts)

mod helpers;

pub use helpers::{encode_metrics, DispatchMetrics, RegistryMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "school_notify";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Completed dispatches by notification kind
    pub static ref NOTIFICATIONS_DISPATCHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_dispatched_total", METRIC_PREFIX),
        "Total notifications dispatched by kind",
        &["kind"]
    ).unwrap();

    /// Dispatches that escalated to a broader audience
    pub static ref FALLBACKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_fallbacks_total", METRIC_PREFIX),
        "Total dispatches that used a fallback audience",
        &["kind"]
    ).unwrap();

    /// Dispatches that reached nobody because nobody was addressable
    pub static ref EMPTY_AUDIENCE_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_empty_audience_total", METRIC_PREFIX),
        "Total dispatches with an empty audience",
        &["kind"]
    ).unwrap();

    /// Dispatches rejected before any send
    pub static ref DISPATCH_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_errors_total", METRIC_PREFIX),
        "Total dispatch calls that failed",
        &["error"]
    ).unwrap();

    /// End-to-end dispatch duration
    pub static ref DISPATCH_DURATION: Histogram = register_histogram!(
        format!("{}_dispatch_duration_seconds", METRIC_PREFIX),
        "Time from dispatch start to aggregated result",
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Per-endpoint sends by channel and outcome
    pub static ref ENDPOINT_SENDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_endpoint_sends_total", METRIC_PREFIX),
        "Total provider sends by channel and outcome",
        &["channel", "outcome"]
    ).unwrap();

    /// Provider call latency by channel
    pub static ref SEND_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_send_latency_seconds", METRIC_PREFIX),
        "Provider send latency in seconds",
        &["channel"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]
    ).unwrap();

    // ============================================================================
    // Registry Metrics
    // ============================================================================

    /// Registrations by result (inserted/updated)
    pub static ref TOKEN_REGISTRATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_token_registrations_total", METRIC_PREFIX),
        "Total device token registrations by result",
        &["result"]
    ).unwrap();

    /// Device tokens stored, active or not
    pub static ref DEVICE_TOKENS_REGISTERED: IntGauge = register_int_gauge!(
        format!("{}_device_tokens_registered", METRIC_PREFIX),
        "Number of stored device tokens"
    ).unwrap();

    /// Device tokens eligible for delivery
    pub static ref DEVICE_TOKENS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_device_tokens_active", METRIC_PREFIX),
        "Number of active device tokens"
    ).unwrap();

    /// Notifications received from the Redis trigger
    pub static ref TRIGGER_MESSAGES_RECEIVED: IntCounter = register_int_counter!(
        format!("{}_trigger_messages_received_total", METRIC_PREFIX),
        "Total notifications received from the Redis trigger"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        // lazy_static requires first access
        DEVICE_TOKENS_ACTIVE.set(1);

        let result = encode_metrics();
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.contains("school_notify_device_tokens_active"));
    }

    #[test]
    fn test_dispatch_metrics() {
        NOTIFICATIONS_DISPATCHED_TOTAL.with_label_values(&["direct"]).inc();
        FALLBACKS_TOTAL.with_label_values(&["announcement"]).inc();
        DISPATCH_DURATION.observe(0.01);
        SEND_LATENCY.with_label_values(&["topic"]).observe(0.002);
        TRIGGER_MESSAGES_RECEIVED.inc();
        // Just verify no panics
    }
}
