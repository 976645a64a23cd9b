//! Push delivery providers.
//!
//! `PushProvider` is the only boundary the engine delivers through:
//!
//! - `HttpPushProvider`: FCM-style HTTP API
//! - `LogPushProvider`: dry run, logs and reports success
//! - `UnconfiguredPushProvider`: always unavailable
//!
//! Use `create_push_provider()` once at startup and inject the handle.

mod backend;
pub mod dry_run;
mod factory;
pub mod http;

pub use backend::{ProviderError, PushProvider, SendOutcome};
pub use dry_run::{LogPushProvider, UnconfiguredPushProvider};
pub use factory::create_push_provider;
pub use http::HttpPushProvider;
