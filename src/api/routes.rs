use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::server::{api_key_auth, AppState};

use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::notifications::dispatch_notification;
use super::tokens::{get_token, register_token, set_token_active};

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                // Device tokens
                .route("/device-tokens", post(register_token))
                .route("/device-tokens/{id}", get(get_token))
                .route("/device-tokens/{id}/active", put(set_token_active))
                // Notifications
                .route("/notifications/dispatch", post(dispatch_notification))
                .route_layer(middleware::from_fn_with_state(state, api_key_auth)),
        )
}
