use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::broadcast;

use crate::config::RedisConfig;
use crate::metrics::DispatchMetrics;
use crate::notification::{FallbackCoordinator, Notification};
use crate::redis::ReconnectBackoff;

/// Redis Pub/Sub subscriber for due notifications.
///
/// Each message is a JSON-encoded `Notification`, dispatched as soon as it
/// arrives.
pub struct RedisTrigger {
    config: RedisConfig,
    coordinator: Arc<FallbackCoordinator>,
    shutdown: broadcast::Sender<()>,
    /// Failed subscription attempts since startup
    reconnects: AtomicU32,
}

impl RedisTrigger {
    pub fn new(
        config: RedisConfig,
        coordinator: Arc<FallbackCoordinator>,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            config,
            coordinator,
            shutdown,
            reconnects: AtomicU32::new(0),
        }
    }

    pub fn reconnects(&self) -> u32 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Start the subscriber loop; returns once shutdown is signalled
    pub async fn start(&self) -> anyhow::Result<()> {
        if self.config.channels.is_empty() {
            tracing::info!("No Redis channels configured, skipping Redis trigger");
            return Ok(());
        }

        tracing::info!(channels = ?self.config.channels, "Starting Redis trigger");

        let mut backoff = ReconnectBackoff::from_config(&self.config);
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            match self.run_subscription_loop(&mut backoff).await {
                Ok(()) => {
                    tracing::info!("Redis trigger stopped gracefully");
                    break;
                }
                Err(e) => {
                    self.reconnects.fetch_add(1, Ordering::Relaxed);
                    let delay = backoff.next_delay();
                    tracing::error!(
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Redis subscription error, reconnecting"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            tracing::info!("Redis trigger stopped while reconnecting");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        Ok(())
    }

    async fn run_subscription_loop(&self, backoff: &mut ReconnectBackoff) -> anyhow::Result<()> {
        let client = redis::Client::open(self.config.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        // Subscribe to channels (with pattern support)
        for channel in &self.config.channels {
            if is_pattern(channel) {
                pubsub.psubscribe(channel).await?;
                tracing::debug!(pattern = %channel, "Subscribed to pattern");
            } else {
                pubsub.subscribe(channel).await?;
                tracing::debug!(channel = %channel, "Subscribed to channel");
            }
        }

        tracing::info!("Redis subscription established");
        backoff.reset();

        let mut message_stream = pubsub.on_message();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Received shutdown signal");
                    return Ok(());
                }
                msg = message_stream.next() => {
                    let Some(msg) = msg else {
                        anyhow::bail!("Redis message stream ended");
                    };
                    let channel = msg.get_channel_name().to_string();
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to get message payload");
                            continue;
                        }
                    };

                    self.handle_message(&channel, &payload).await;
                }
            }
        }
    }

    async fn handle_message(&self, channel: &str, payload: &str) {
        DispatchMetrics::record_trigger_received();

        let Some(mut notification) = parse_notification(channel, payload) else {
            return;
        };
        let scheduled_at = notification.scheduled_at();
        notification.mark_issued(Utc::now());

        match self.coordinator.dispatch(&notification).await {
            Ok(report) => tracing::debug!(
                channel = %channel,
                notification_id = %notification.id,
                scheduled_at = ?scheduled_at,
                issued_at = ?notification.issued_at(),
                success_count = report.result.success_count,
                failure_count = report.result.failure_count,
                "Dispatched notification from Redis"
            ),
            // Already logged and counted by the coordinator
            Err(e) => tracing::debug!(
                channel = %channel,
                notification_id = %notification.id,
                error = %e,
                "Redis notification not dispatched"
            ),
        }
    }
}

fn is_pattern(channel: &str) -> bool {
    channel.contains('*') || channel.contains('?') || channel.contains('[')
}

fn parse_notification(channel: &str, payload: &str) -> Option<Notification> {
    match serde_json::from_str(payload) {
        Ok(notification) => Some(notification),
        Err(e) => {
            tracing::warn!(
                error = %e,
                channel = %channel,
                payload_len = payload.len(),
                "Failed to parse Redis notification"
            );
            None
        }
    }
}
