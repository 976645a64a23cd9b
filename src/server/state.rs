use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::notification::{build_engine, FallbackCoordinator};
use crate::postgres::PostgresPool;
use crate::provider::{create_push_provider, ProviderError, PushProvider};
use crate::registry::{create_class_roster, create_token_registry, ClassRoster, DeviceTokenRegistry};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<dyn DeviceTokenRegistry>,
    pub roster: Arc<dyn ClassRoster>,
    pub coordinator: Arc<FallbackCoordinator>,
    pub postgres_pool: Option<Arc<PostgresPool>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        postgres_pool: Option<Arc<PostgresPool>>,
    ) -> Result<Self, ProviderError> {
        let registry = create_token_registry(&settings.registry, postgres_pool.clone());
        let roster = create_class_roster(&settings.registry, postgres_pool.clone());
        let provider = create_push_provider(&settings.provider)?;

        let mut state = Self::from_parts(settings, registry, roster, provider);
        state.postgres_pool = postgres_pool;
        Ok(state)
    }

    /// Assemble state from already-built components
    pub fn from_parts(
        settings: Settings,
        registry: Arc<dyn DeviceTokenRegistry>,
        roster: Arc<dyn ClassRoster>,
        provider: Arc<dyn PushProvider>,
    ) -> Self {
        let coordinator = build_engine(&settings.dispatch, registry.clone(), roster.clone(), provider);

        Self {
            settings: Arc::new(settings),
            registry,
            roster,
            coordinator,
            postgres_pool: None,
            start_time: Instant::now(),
        }
    }
}
