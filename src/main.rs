use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use school_notification_service::config::Settings;
use school_notification_service::postgres::PostgresPool;
use school_notification_service::server::{create_app, AppState};
use school_notification_service::shutdown::{wait_for_os_signal, GracefulShutdown};
use school_notification_service::telemetry::init_telemetry;
use school_notification_service::triggers::RedisTrigger;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing (kept alive until main returns)
    let _telemetry = init_telemetry(&settings.logging, &settings.otel)?;
    tracing::info!("Configuration loaded");

    // Connect to PostgreSQL if configured
    let postgres_pool = match &settings.database {
        Some(database) => Some(Arc::new(PostgresPool::new(database).await?)),
        None => {
            if settings.registry.backend == "postgres" {
                tracing::warn!("registry.backend is postgres but no database is configured");
            }
            None
        }
    };

    // Create application state
    let state = AppState::new(settings.clone(), postgres_pool.clone())?;
    tracing::info!(
        registry = state.registry.backend_type(),
        "Application state initialized"
    );

    let (shutdown_tx, _) = broadcast::channel(1);

    // Start Redis trigger in background
    let redis_handle = if settings.redis.enabled {
        let trigger = RedisTrigger::new(
            settings.redis.clone(),
            state.coordinator.clone(),
            shutdown_tx.clone(),
        );
        Some(tokio::spawn(async move {
            if let Err(e) = trigger.start().await {
                tracing::error!(error = %e, "Redis trigger failed");
            }
        }))
    } else {
        tracing::info!("Redis trigger disabled");
        None
    };

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    let shutdown = GracefulShutdown::new(shutdown_tx, postgres_pool);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let reason = wait_for_os_signal().await;
            tracing::info!(signal = reason, "Received signal, initiating graceful shutdown");
            shutdown.execute(reason).await;
        })
        .await?;

    // Wait for background tasks to finish
    if let Some(handle) = redis_handle {
        tracing::info!("Waiting for background tasks to finish...");
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}
