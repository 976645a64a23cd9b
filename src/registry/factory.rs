//! Registry backend factory

use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::postgres::PostgresPool;

use super::backend::{ClassRoster, DeviceTokenRegistry};
use super::memory_backend::MemoryTokenRegistry;
use super::postgres_backend::{PostgresClassRoster, PostgresTokenRegistry};
use super::roster::MemoryClassRoster;

/// Create a token registry based on configuration.
///
/// - `"postgres"`: `PostgresTokenRegistry` if a pool is provided
/// - `"memory"` (default): `MemoryTokenRegistry`
pub fn create_token_registry(
    settings: &RegistryConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Arc<dyn DeviceTokenRegistry> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(backend = "postgres", "Creating PostgreSQL token registry");
                Arc::new(PostgresTokenRegistry::new(pool.pool().clone()))
            } else {
                tracing::warn!(
                    "PostgreSQL registry requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryTokenRegistry::new())
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory token registry");
            Arc::new(MemoryTokenRegistry::new())
        }
    }
}

/// Create the class roster matching the registry backend.
pub fn create_class_roster(
    settings: &RegistryConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Arc<dyn ClassRoster> {
    match (settings.backend.as_str(), postgres_pool) {
        ("postgres", Some(pool)) => Arc::new(PostgresClassRoster::new(pool.pool().clone())),
        _ => Arc::new(MemoryClassRoster::new()),
    }
}
