//! Provider factory

use std::sync::Arc;

use crate::config::ProviderConfig;

use super::backend::{ProviderError, PushProvider};
use super::http::HttpPushProvider;
use super::dry_run::{LogPushProvider, UnconfiguredPushProvider};

/// Create the process-wide push provider handle.
///
/// - `"http"`: `HttpPushProvider`; fails if no endpoint is configured
/// - `"disabled"`: `UnconfiguredPushProvider`, every dispatch reports the provider unavailable
/// - `"log"` (default): `LogPushProvider` dry run
pub fn create_push_provider(settings: &ProviderConfig) -> Result<Arc<dyn PushProvider>, ProviderError> {
    match settings.kind.as_str() {
        "http" => {
            let provider = HttpPushProvider::new(settings)?;
            tracing::info!(provider = "http", url = %provider.send_url(), "Creating HTTP push provider");
            Ok(Arc::new(provider))
        }
        "disabled" => {
            tracing::warn!("Push provider disabled, dispatches will be rejected");
            Ok(Arc::new(UnconfiguredPushProvider))
        }
        "log" => {
            tracing::info!(provider = "log", "Creating dry-run push provider");
            Ok(Arc::new(LogPushProvider::new()))
        }
        other => Err(ProviderError::Configuration(format!(
            "unknown provider kind: {}",
            other
        ))),
    }
}
