//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::DispatcherStatsSnapshot;
use crate::registry::RegistryStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub provider: ProviderHealthResponse,
    pub registry: RegistryHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
}

#[derive(Debug, Serialize)]
pub struct ProviderHealthResponse {
    pub name: String,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct RegistryHealthResponse {
    pub backend: String,
    pub reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub pool_size: u32,
    pub idle_connections: u32,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub dispatcher: DispatcherStatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryStats>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.coordinator.dispatcher().provider();
    let provider_available = provider.is_available();
    let registry_reachable = state.registry.stats().await.is_ok();

    let postgres = state.postgres_pool.as_ref().map(|pool| {
        let inner_pool = pool.pool();
        PostgresHealthResponse {
            pool_size: inner_pool.size(),
            idle_connections: inner_pool.num_idle() as u32,
        }
    });

    let status = if provider_available && registry_reachable {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        provider: ProviderHealthResponse {
            name: provider.name().to_string(),
            available: provider_available,
        },
        registry: RegistryHealthResponse {
            backend: state.registry.backend_type().to_string(),
            reachable: registry_reachable,
        },
        postgres,
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let registry = match state.registry.stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read registry stats");
            None
        }
    };

    Json(StatsResponse {
        dispatcher: state.coordinator.dispatcher().stats(),
        registry,
    })
}
