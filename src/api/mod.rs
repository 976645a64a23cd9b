//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod metrics;
mod notifications;
mod routes;
mod tokens;

// Re-export all handlers for use in server/app.rs
pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use notifications::{dispatch_notification, DispatchResponse};
pub use routes::api_routes;
pub use tokens::{get_token, register_token, set_token_active, SetActiveRequest, TokenResponse};
