//! Device token records and lookup filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RegistryError;

/// Kind of device a push token was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Ios,
    Android,
    Web,
    #[default]
    Unknown,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Ios => "ios",
            DeviceKind::Android => "android",
            DeviceKind::Web => "web",
            DeviceKind::Unknown => "unknown",
        }
    }

    /// Parse a stored value, mapping anything unrecognized to `Unknown`
    pub fn parse(value: &str) -> Self {
        match value {
            "ios" => DeviceKind::Ios,
            "android" => DeviceKind::Android,
            "web" => DeviceKind::Web,
            _ => DeviceKind::Unknown,
        }
    }
}

/// A per-installation push address owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceToken {
    pub id: Uuid,
    pub owner_id: String,
    pub tenant_id: String,
    pub role: String,
    /// Opaque provider address, globally unique
    pub token: String,
    /// Optional broadcast topic label the device subscribed under
    pub topic: Option<String>,
    pub device_kind: DeviceKind,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceToken {
    /// Create a fresh, active record from a registration
    pub fn from_registration(registration: TokenRegistration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: registration.owner_id,
            tenant_id: registration.tenant_id,
            role: registration.role,
            token: registration.token,
            topic: registration.topic,
            device_kind: registration.device_kind.unwrap_or_default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a re-registration of the same token onto this record.
    ///
    /// A client re-registering is alive, so the record becomes active again.
    pub fn apply_registration(&mut self, registration: TokenRegistration) {
        self.owner_id = registration.owner_id;
        self.tenant_id = registration.tenant_id;
        self.role = registration.role;
        self.topic = registration.topic;
        if let Some(kind) = registration.device_kind {
            self.device_kind = kind;
        }
        self.is_active = true;
        self.updated_at = Utc::now();
    }

    /// Shortened token for log output
    pub fn redacted(&self) -> String {
        redact_token(&self.token)
    }
}

/// Result of an upsert: the stored record and whether it was newly created
#[derive(Debug, Clone)]
pub struct UpsertedToken {
    pub token: DeviceToken,
    pub created: bool,
}

/// Shorten an opaque token so it can be logged without leaking the address
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    if prefix.len() < token.len() {
        format!("{}…", prefix)
    } else {
        prefix
    }
}

/// Client registration request, upserted by `token`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRegistration {
    pub token: String,
    pub owner_id: String,
    pub tenant_id: String,
    pub role: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub device_kind: Option<DeviceKind>,
}

impl TokenRegistration {
    pub fn new(
        token: impl Into<String>,
        owner_id: impl Into<String>,
        tenant_id: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            owner_id: owner_id.into(),
            tenant_id: tenant_id.into(),
            role: role.into(),
            topic: None,
            device_kind: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_device_kind(mut self, kind: DeviceKind) -> Self {
        self.device_kind = Some(kind);
        self
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        for (field, value) in [
            ("token", &self.token),
            ("owner_id", &self.owner_id),
            ("tenant_id", &self.tenant_id),
            ("role", &self.role),
        ] {
            if value.trim().is_empty() {
                return Err(RegistryError::Validation(format!("{} is required", field)));
            }
        }

        if matches!(&self.topic, Some(topic) if topic.trim().is_empty()) {
            return Err(RegistryError::Validation(
                "topic must not be blank when provided".to_string(),
            ));
        }

        Ok(())
    }
}

/// Lookup selecting a subset of registered tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenFilter {
    /// All devices of one user within `tenant_id`
    Owner { tenant_id: String, owner_id: String },
    /// All devices of any of these users within `tenant_id`
    Owners {
        tenant_id: String,
        owner_ids: Vec<String>,
    },
    /// Everyone holding `role` within `tenant_id`
    Role { tenant_id: String, role: String },
    /// Every device in a tenant
    Tenant(String),
    /// Devices whose topic label is one of these names
    Topics(Vec<String>),
}

impl TokenFilter {
    pub fn owner(tenant_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        TokenFilter::Owner {
            tenant_id: tenant_id.into(),
            owner_id: owner_id.into(),
        }
    }

    /// Whether a record falls under this filter, ignoring its active flag
    pub fn matches(&self, record: &DeviceToken) -> bool {
        match self {
            TokenFilter::Owner { tenant_id, owner_id } => {
                &record.tenant_id == tenant_id && &record.owner_id == owner_id
            }
            TokenFilter::Owners {
                tenant_id,
                owner_ids,
            } => &record.tenant_id == tenant_id && owner_ids.iter().any(|o| o == &record.owner_id),
            TokenFilter::Role { tenant_id, role } => {
                &record.tenant_id == tenant_id && &record.role == role
            }
            TokenFilter::Tenant(tenant_id) => &record.tenant_id == tenant_id,
            TokenFilter::Topics(topics) => record
                .topic
                .as_ref()
                .map(|t| topics.iter().any(|name| name == t))
                .unwrap_or(false),
        }
    }
}

/// Registry size counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    pub backend_type: String,
    pub total_tokens: usize,
    pub active_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_validation() {
        assert!(TokenRegistration::new("tok", "u1", "school-1", "student")
            .validate()
            .is_ok());

        let missing_role = TokenRegistration::new("tok", "u1", "school-1", " ");
        assert!(matches!(
            missing_role.validate(),
            Err(RegistryError::Validation(_))
        ));

        let blank_topic =
            TokenRegistration::new("tok", "u1", "school-1", "student").with_topic("");
        assert!(blank_topic.validate().is_err());
    }

    #[test]
    fn test_apply_registration_reactivates() {
        let mut record =
            DeviceToken::from_registration(TokenRegistration::new("tok", "u1", "s1", "student"));
        record.is_active = false;

        record.apply_registration(
            TokenRegistration::new("tok", "u1", "s1", "teacher")
                .with_device_kind(DeviceKind::Android),
        );

        assert!(record.is_active);
        assert_eq!(record.role, "teacher");
        assert_eq!(record.device_kind, DeviceKind::Android);
    }

    #[test]
    fn test_filter_matching() {
        let record = DeviceToken::from_registration(
            TokenRegistration::new("tok", "u1", "s1", "teacher").with_topic("tenant_s1"),
        );

        assert!(TokenFilter::owner("s1", "u1").matches(&record));
        assert!(!TokenFilter::owner("s2", "u1").matches(&record));
        assert!(TokenFilter::Owners {
            tenant_id: "s1".into(),
            owner_ids: vec!["u0".into(), "u1".into()]
        }
        .matches(&record));
        assert!(!TokenFilter::Owners {
            tenant_id: "s2".into(),
            owner_ids: vec!["u1".into()]
        }
        .matches(&record));
        assert!(TokenFilter::Role {
            tenant_id: "s1".into(),
            role: "teacher".into()
        }
        .matches(&record));
        assert!(!TokenFilter::Role {
            tenant_id: "s2".into(),
            role: "teacher".into()
        }
        .matches(&record));
        assert!(TokenFilter::Tenant("s1".into()).matches(&record));
        assert!(TokenFilter::Topics(vec!["s1".into(), "tenant_s1".into()]).matches(&record));
        assert!(!TokenFilter::Topics(vec!["s1".into()]).matches(&record));
    }

    #[test]
    fn test_redact_token() {
        assert_eq!(redact_token("abc"), "abc");
        assert_eq!(redact_token("0123456789abcdef"), "01234567…");
    }
}
