//! In-memory device token registry using DashMap.
//!
//! Registrations are lost on restart. Used in development and tests, and as
//! the fallback when no PostgreSQL pool is configured.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::metrics::RegistryMetrics;

use super::backend::{DeviceTokenRegistry, RegistryError};
use super::types::{DeviceToken, RegistryStats, TokenFilter, TokenRegistration, UpsertedToken};

/// In-memory token registry.
///
/// Records live in `tokens`; `token_index` maps the opaque token string to its
/// record id and is the uniqueness guard for upserts.
pub struct MemoryTokenRegistry {
    /// record id -> record
    tokens: DashMap<Uuid, DeviceToken>,
    /// token string -> record id
    token_index: DashMap<String, Uuid>,
}

impl MemoryTokenRegistry {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
            token_index: DashMap::new(),
        }
    }

    /// Number of records, active or not
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for MemoryTokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceTokenRegistry for MemoryTokenRegistry {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, registration: TokenRegistration) -> Result<UpsertedToken, RegistryError> {
        registration.validate()?;

        // Holding the index entry serializes concurrent registrations of one token
        match self.token_index.entry(registration.token.clone()) {
            Entry::Occupied(entry) => {
                let id = *entry.get();
                let mut record = self
                    .tokens
                    .get_mut(&id)
                    .ok_or(RegistryError::NotFound(id))?;
                record.apply_registration(registration);
                RegistryMetrics::record_registration(false);

                tracing::debug!(
                    token_id = %id,
                    owner_id = %record.owner_id,
                    token = %record.redacted(),
                    "Device token re-registered"
                );

                Ok(UpsertedToken {
                    token: record.clone(),
                    created: false,
                })
            }
            Entry::Vacant(entry) => {
                let record = DeviceToken::from_registration(registration);
                entry.insert(record.id);
                self.tokens.insert(record.id, record.clone());
                RegistryMetrics::record_registration(true);

                tracing::debug!(
                    token_id = %record.id,
                    owner_id = %record.owner_id,
                    tenant_id = %record.tenant_id,
                    token = %record.redacted(),
                    "Device token registered"
                );

                Ok(UpsertedToken {
                    token: record,
                    created: true,
                })
            }
        }
    }

    async fn set_active(&self, token_id: Uuid, is_active: bool) -> Result<(), RegistryError> {
        let mut record = self
            .tokens
            .get_mut(&token_id)
            .ok_or(RegistryError::NotFound(token_id))?;

        if record.is_active != is_active {
            record.is_active = is_active;
            record.updated_at = chrono::Utc::now();
        }

        tracing::debug!(token_id = %token_id, is_active, "Device token active flag set");
        Ok(())
    }

    async fn get(&self, token_id: Uuid) -> Result<DeviceToken, RegistryError> {
        self.tokens
            .get(&token_id)
            .map(|r| r.clone())
            .ok_or(RegistryError::NotFound(token_id))
    }

    async fn find_active(&self, filter: &TokenFilter) -> Result<Vec<DeviceToken>, RegistryError> {
        Ok(self
            .tokens
            .iter()
            .filter(|entry| entry.is_active && filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn stats(&self) -> Result<RegistryStats, RegistryError> {
        let active = self.tokens.iter().filter(|entry| entry.is_active).count();
        Ok(RegistryStats {
            backend_type: self.backend_type().to_string(),
            total_tokens: self.tokens.len(),
            active_tokens: active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(token: &str, owner: &str) -> TokenRegistration {
        TokenRegistration::new(token, owner, "school-1", "student")
    }

    #[tokio::test]
    async fn test_register_creates_record() {
        let registry = MemoryTokenRegistry::new();
        let record = registry.register(registration("tok-1", "u1")).await.unwrap();

        assert!(record.is_active);
        assert_eq!(registry.get(record.id).await.unwrap(), record);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_reregister_updates_in_place() {
        let registry = MemoryTokenRegistry::new();
        let first = registry.upsert(registration("tok-1", "u1")).await.unwrap();
        let second = registry
            .upsert(registration("tok-1", "u1").with_topic("tenant_school-1"))
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.token.id, second.token.id);
        assert_eq!(second.token.topic.as_deref(), Some("tenant_school-1"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid() {
        let registry = MemoryTokenRegistry::new();
        let result = registry.register(registration("", "u1")).await;
        assert!(matches!(result, Err(RegistryError::Validation(_))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_set_active_hides_from_lookup() {
        let registry = MemoryTokenRegistry::new();
        let record = registry.register(registration("tok-1", "u1")).await.unwrap();
        let filter = TokenFilter::owner("school-1", "u1");

        registry.set_active(record.id, false).await.unwrap();
        assert!(registry.find_active(&filter).await.unwrap().is_empty());
        // Record is kept
        assert!(!registry.get(record.id).await.unwrap().is_active);

        registry.set_active(record.id, true).await.unwrap();
        assert_eq!(registry.find_active(&filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_active_unknown_id() {
        let registry = MemoryTokenRegistry::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            registry.set_active(missing, false).await,
            Err(RegistryError::NotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn test_stats() {
        let registry = MemoryTokenRegistry::new();
        let a = registry.register(registration("a", "u1")).await.unwrap();
        registry.register(registration("b", "u2")).await.unwrap();
        registry.set_active(a.id, false).await.unwrap();

        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.backend_type, "memory");
        assert_eq!(stats.total_tokens, 2);
        assert_eq!(stats.active_tokens, 1);
    }
}
