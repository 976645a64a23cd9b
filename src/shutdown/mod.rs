//! Graceful shutdown handling for the notification service.
//!
//! Shutdown runs in two phases:
//! 1. Signal background tasks (the Redis trigger) to stop taking new work
//! 2. Close the PostgreSQL pool once in-flight queries have finished

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::postgres::PostgresPool;

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for the database pool to close (default: 10 seconds)
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Handles graceful shutdown of the notification service
pub struct GracefulShutdown {
    shutdown_tx: broadcast::Sender<()>,
    postgres_pool: Option<Arc<PostgresPool>>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(shutdown_tx: broadcast::Sender<()>, postgres_pool: Option<Arc<PostgresPool>>) -> Self {
        Self::with_config(shutdown_tx, postgres_pool, ShutdownConfig::default())
    }

    pub fn with_config(
        shutdown_tx: broadcast::Sender<()>,
        postgres_pool: Option<Arc<PostgresPool>>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            shutdown_tx,
            postgres_pool,
            config,
        }
    }

    /// Execute graceful shutdown sequence
    #[tracing::instrument(name = "graceful_shutdown", skip(self))]
    pub async fn execute(&self, reason: &str) -> ShutdownResult {
        let start = std::time::Instant::now();
        let mut result = ShutdownResult::default();

        // Phase 1: Signal background tasks to stop
        tracing::info!(reason = %reason, "Starting graceful shutdown - Phase 1: Signaling background tasks");
        result.tasks_signaled = self.shutdown_tx.send(()).unwrap_or(0);

        // Phase 2: Close the database pool
        tracing::info!("Phase 2: Closing database pool");
        result.pool_closed = match &self.postgres_pool {
            Some(pool) => match timeout(self.config.drain_timeout, pool.close()).await {
                Ok(()) => true,
                Err(_) => {
                    tracing::warn!("Database pool close timed out");
                    false
                }
            },
            None => true,
        };

        result.duration = start.elapsed();
        result.success = result.pool_closed;

        tracing::info!(
            tasks_signaled = result.tasks_signaled,
            pool_closed = result.pool_closed,
            duration_ms = result.duration.as_millis(),
            "Graceful shutdown completed"
        );

        result
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Whether shutdown completed successfully
    pub success: bool,
    /// Number of background tasks that received the stop signal
    pub tasks_signaled: usize,
    /// Whether the database pool closed within the drain timeout
    pub pool_closed: bool,
    /// Total time taken for shutdown
    pub duration: Duration,
}

/// Resolve once Ctrl+C or SIGTERM is received, returning a description of the signal
pub async fn wait_for_os_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "ctrl_c",
        _ = terminate => "terminate",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_signals_subscribers() {
        let (tx, mut rx) = broadcast::channel(1);
        let shutdown = GracefulShutdown::new(tx, None);

        let result = shutdown.execute("test shutdown").await;

        assert!(result.success);
        assert_eq!(result.tasks_signaled, 1);
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_without_subscribers() {
        let (tx, _) = broadcast::channel::<()>(1);
        let shutdown = GracefulShutdown::new(tx, None);

        let result = shutdown.execute("test shutdown").await;
        assert!(result.success);
        assert_eq!(result.tasks_signaled, 0);
    }

    #[test]
    fn test_shutdown_config_defaults() {
        let config = ShutdownConfig::default();
        assert_eq!(config.drain_timeout, Duration::from_secs(10));
    }
}
