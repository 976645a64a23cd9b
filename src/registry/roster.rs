//! In-memory class roster

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;

use super::backend::{ClassRoster, RegistryError};

/// Class membership kept in memory, keyed by `(tenant_id, class_id)`.
pub struct MemoryClassRoster {
    classes: DashMap<(String, String), HashSet<String>>,
}

impl MemoryClassRoster {
    pub fn new() -> Self {
        Self {
            classes: DashMap::new(),
        }
    }

    fn key(tenant_id: &str, class_id: &str) -> (String, String) {
        (tenant_id.to_string(), class_id.to_string())
    }

    /// Enroll an owner in a tenant's class
    pub fn add_member(&self, tenant_id: &str, class_id: &str, owner_id: &str) {
        self.classes
            .entry(Self::key(tenant_id, class_id))
            .or_default()
            .insert(owner_id.to_string());
    }

    /// Remove an owner from a class, dropping the class once empty
    pub fn remove_member(&self, tenant_id: &str, class_id: &str, owner_id: &str) {
        let key = Self::key(tenant_id, class_id);
        if let Some(mut members) = self.classes.get_mut(&key) {
            members.remove(owner_id);
            if members.is_empty() {
                drop(members);
                self.classes.remove(&key);
            }
        }
    }
}

impl Default for MemoryClassRoster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClassRoster for MemoryClassRoster {
    async fn members(&self, tenant_id: &str, class_id: &str) -> Result<Vec<String>, RegistryError> {
        Ok(self
            .classes
            .get(&Self::key(tenant_id, class_id))
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }
}
