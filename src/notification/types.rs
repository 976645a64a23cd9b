use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::registry::RegistryError;

/// Extra key/value data forwarded to the device alongside the visible message
pub type DataPayload = HashMap<String, String>;

/// Logical kind of a notification, deciding how its audience is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A single user (all of their devices)
    Direct,
    /// Every member of a class
    Class,
    /// Everyone holding a role within a tenant
    Role,
    /// The whole tenant
    Announcement,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Direct => "direct",
            NotificationKind::Class => "class",
            NotificationKind::Role => "role",
            NotificationKind::Announcement => "announcement",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addressing of a notification, discriminated by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationTarget {
    Direct { owner_id: String },
    Class { class_id: String },
    Role { tenant_id: String, role: String },
    Announcement { tenant_id: String },
}

impl NotificationTarget {
    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationTarget::Direct { .. } => NotificationKind::Direct,
            NotificationTarget::Class { .. } => NotificationKind::Class,
            NotificationTarget::Role { .. } => NotificationKind::Role,
            NotificationTarget::Announcement { .. } => NotificationKind::Announcement,
        }
    }
}

/// Visible content of a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub title: String,
    pub body: String,
}

impl Message {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Delivery timing of a notification.
///
/// A scheduled notification carries only its due instant; once dispatch is
/// attempted the schedule is replaced by the issue instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Schedule {
    /// Send as soon as it is submitted
    #[default]
    Immediate,
    /// Deferred until an external trigger submits it
    Scheduled { at: DateTime<Utc> },
    /// Dispatch was attempted at this instant
    Issued { at: DateTime<Utc> },
}

/// A logical message addressed to a user, class, role or whole tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub tenant_id: String,
    pub target: NotificationTarget,
    pub message: Message,
    #[serde(default)]
    pub data: DataPayload,
    #[serde(default)]
    pub schedule: Schedule,
    pub created_by: String,
}

impl Notification {
    pub fn builder(
        target: NotificationTarget,
        tenant_id: impl Into<String>,
        created_by: impl Into<String>,
    ) -> NotificationBuilder {
        NotificationBuilder::new(target, tenant_id, created_by)
    }

    pub fn kind(&self) -> NotificationKind {
        self.target.kind()
    }

    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        match self.schedule {
            Schedule::Scheduled { at } => Some(at),
            _ => None,
        }
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        match self.schedule {
            Schedule::Issued { at } => Some(at),
            _ => None,
        }
    }

    /// Record that dispatch is being attempted. Clears any pending schedule.
    pub fn mark_issued(&mut self, at: DateTime<Utc>) {
        self.schedule = Schedule::Issued { at };
    }

    /// Check that the target references are present and belong to this tenant
    pub fn validate_selector(&self) -> Result<(), DispatchError> {
        if self.tenant_id.trim().is_empty() {
            return Err(DispatchError::InvalidSelector(
                "notification has no tenant_id".to_string(),
            ));
        }

        let check = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(DispatchError::InvalidSelector(format!(
                    "{} target is missing {}",
                    self.kind(),
                    field
                )))
            } else {
                Ok(())
            }
        };

        match &self.target {
            NotificationTarget::Direct { owner_id } => check("owner_id", owner_id),
            NotificationTarget::Class { class_id } => check("class_id", class_id),
            NotificationTarget::Role { tenant_id, role } => {
                check("tenant_id", tenant_id)?;
                check("role", role)?;
                self.check_same_tenant(tenant_id)
            }
            NotificationTarget::Announcement { tenant_id } => {
                check("tenant_id", tenant_id)?;
                self.check_same_tenant(tenant_id)
            }
        }
    }

    fn check_same_tenant(&self, target_tenant: &str) -> Result<(), DispatchError> {
        if target_tenant != self.tenant_id {
            return Err(DispatchError::InvalidSelector(format!(
                "target tenant {} does not match notification tenant {}",
                target_tenant, self.tenant_id
            )));
        }
        Ok(())
    }
}

/// Builder for notifications created outside the CRUD layer (triggers, tests)
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    tenant_id: String,
    target: NotificationTarget,
    message: Message,
    data: DataPayload,
    schedule: Schedule,
    created_by: String,
}

impl NotificationBuilder {
    pub fn new(
        target: NotificationTarget,
        tenant_id: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            target,
            message: Message::new("", ""),
            data: DataPayload::new(),
            schedule: Schedule::Immediate,
            created_by: created_by.into(),
        }
    }

    pub fn message(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.message = Message::new(title, body);
        self
    }

    pub fn data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn schedule_at(mut self, at: DateTime<Utc>) -> Self {
        self.schedule = Schedule::Scheduled { at };
        self
    }

    pub fn build(self) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            target: self.target,
            message: self.message,
            data: self.data,
            schedule: self.schedule,
            created_by: self.created_by,
        }
    }
}

/// Delivery channel used for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    TokenList,
    Topic,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::TokenList => "token_list",
            Channel::Topic => "topic",
        }
    }
}

/// Concrete delivery target(s) resolved for one notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum RecipientSet {
    TokenList { tokens: Vec<String> },
    Topic { name: String },
}

impl RecipientSet {
    pub fn tokens(tokens: Vec<String>) -> Self {
        RecipientSet::TokenList { tokens }
    }

    pub fn topic(name: impl Into<String>) -> Self {
        RecipientSet::Topic { name: name.into() }
    }

    pub fn channel(&self) -> Channel {
        match self {
            RecipientSet::TokenList { .. } => Channel::TokenList,
            RecipientSet::Topic { .. } => Channel::Topic,
        }
    }

    /// Number of endpoints a dispatch will address
    pub fn len(&self) -> usize {
        match self {
            RecipientSet::TokenList { tokens } => tokens.len(),
            RecipientSet::Topic { .. } => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Error kinds reported in a [`DeliveryResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or missing target reference
    InvalidSelector,
    /// Resolution produced no deliverable endpoint
    EmptyAudience,
    /// The push provider is unreachable or unconfigured
    ProviderUnavailable,
    /// Some, but not all, endpoint sends failed
    PartialDeliveryFailure,
    /// Endpoints were attempted and every one failed
    DeliveryFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidSelector => "INVALID_SELECTOR",
            ErrorKind::EmptyAudience => "EMPTY_AUDIENCE",
            ErrorKind::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            ErrorKind::PartialDeliveryFailure => "PARTIAL_DELIVERY_FAILURE",
            ErrorKind::DeliveryFailed => "DELIVERY_FAILED",
        }
    }
}

/// Errors that fail a whole dispatch call
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Push provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Token registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl DispatchError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            DispatchError::InvalidSelector(_) => Some(ErrorKind::InvalidSelector),
            DispatchError::ProviderUnavailable(_) => Some(ErrorKind::ProviderUnavailable),
            DispatchError::Registry(_) => None,
        }
    }
}

/// Summarized outcome of one dispatch invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub notification_id: Uuid,
    /// Channel of the last attempt made
    pub channel_attempted: Channel,
    pub success_count: usize,
    pub failure_count: usize,
    /// Whether delivery escalated past the first, empty, lookup
    pub fallback_used: bool,
    pub errors: Vec<ErrorKind>,
    /// True iff at least one endpoint was reached
    pub success: bool,
}
