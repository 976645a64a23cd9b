//! Notification model and the fan-out delivery engine.
//!
//! Data flows leaves-first:
//!
//! - `AudienceResolver`: notification target -> `RecipientSet`
//! - `DeliveryDispatcher`: `RecipientSet` -> per-endpoint `Outcome`s
//! - `aggregator`: outcomes -> `DeliveryResult`
//! - `FallbackCoordinator`: runs the three, escalating announcements from
//!   token lists to topic broadcast when no tokens are enumerable
//!
//! Build the engine once with `build_engine()` and share the coordinator.

pub mod aggregator;
mod coordinator;
mod dispatcher;
pub mod resolver;
mod types;

use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::provider::PushProvider;
use crate::registry::{ClassRoster, DeviceTokenRegistry};

pub use aggregator::{aggregate, ChannelAttempt, DeliveryAggregator, DispatchReport};
pub use coordinator::FallbackCoordinator;
pub use dispatcher::{
    DeliveryDispatcher, DispatcherStats, DispatcherStatsSnapshot, Outcome, DEFAULT_CHUNK_SIZE,
};
pub use resolver::{AudienceResolver, AudienceSource, Resolution, ResolutionStep};
pub use types::{
    Channel, DataPayload, DeliveryResult, DispatchError, ErrorKind, Message, Notification,
    NotificationBuilder, NotificationKind, NotificationTarget, RecipientSet, Schedule,
};

/// Wire the resolver, dispatcher and coordinator together.
///
/// The provider handle is created once by the caller and injected here.
pub fn build_engine(
    config: &DispatchConfig,
    registry: Arc<dyn DeviceTokenRegistry>,
    roster: Arc<dyn ClassRoster>,
    provider: Arc<dyn PushProvider>,
) -> Arc<FallbackCoordinator> {
    let resolver = AudienceResolver::with_topic_prefix(registry, roster, config.topic_prefix.clone());
    let dispatcher = Arc::new(DeliveryDispatcher::with_config(provider, config));

    tracing::info!(
        provider = dispatcher.provider().name(),
        chunk_size = config.chunk_size,
        max_concurrent_sends = config.max_concurrent_sends,
        send_timeout_ms = config.send_timeout_ms,
        "Delivery engine initialized"
    );

    Arc::new(FallbackCoordinator::new(resolver, dispatcher))
}
