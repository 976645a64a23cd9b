//! Backend trait for device token storage.
//!
//! The registry is the only state the delivery engine reads. Implementations
//! must serve concurrent reads while registrations are being written, without
//! the dispatcher holding any lock of its own.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::types::{DeviceToken, RegistryStats, TokenFilter, TokenRegistration, UpsertedToken};

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No record with this id
    #[error("Device token not found: {0}")]
    NotFound(Uuid),

    /// Registration payload is incomplete
    #[error("Invalid registration: {0}")]
    Validation(String),

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),
}

/// Storage for device token registrations.
///
/// Records are never hard-deleted: revocation flips `is_active`, so history
/// stays available for audit.
#[async_trait]
pub trait DeviceTokenRegistry: Send + Sync {
    /// Backend type identifier
    fn backend_type(&self) -> &'static str;

    /// Insert a registration, or update the existing record holding the same token.
    async fn upsert(&self, registration: TokenRegistration) -> Result<UpsertedToken, RegistryError>;

    /// Upsert and return only the stored record.
    async fn register(&self, registration: TokenRegistration) -> Result<DeviceToken, RegistryError> {
        Ok(self.upsert(registration).await?.token)
    }

    /// Soft revoke (`false`) or restore (`true`) a record.
    async fn set_active(&self, token_id: Uuid, is_active: bool) -> Result<(), RegistryError>;

    /// Fetch a record regardless of its active flag.
    async fn get(&self, token_id: Uuid) -> Result<DeviceToken, RegistryError>;

    /// Active records matching the filter.
    async fn find_active(&self, filter: &TokenFilter) -> Result<Vec<DeviceToken>, RegistryError>;

    /// Registry size counters.
    async fn stats(&self) -> Result<RegistryStats, RegistryError>;
}

/// Membership lookup for classes, owned by the CRUD layer.
#[async_trait]
pub trait ClassRoster: Send + Sync {
    /// Owner ids of everyone enrolled in or teaching the class.
    ///
    /// Class ids are only unique within a tenant.
    async fn members(&self, tenant_id: &str, class_id: &str) -> Result<Vec<String>, RegistryError>;
}
