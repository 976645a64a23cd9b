//! Audience resolution: turns a notification's logical target into concrete
//! delivery endpoints.
//!
//! Per-kind behavior comes from a small strategy table instead of one branch
//! per audience. Only tenant-wide announcements escalate past the first
//! lookup: first to tokens labelled with a tenant topic, then to a pure topic
//! broadcast.

use std::sync::Arc;

use serde::Serialize;

use crate::registry::{ClassRoster, DeviceToken, DeviceTokenRegistry, TokenFilter};

use super::types::{DispatchError, Notification, NotificationKind, NotificationTarget, RecipientSet};

/// Default prefix for the tenant topic naming convention
pub const DEFAULT_TOPIC_PREFIX: &str = "tenant_";

/// Where a set of endpoints was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceSource {
    OwnerTokens,
    ClassTokens,
    RoleTokens,
    TenantTokens,
    TopicLabelledTokens,
    TopicBroadcast,
}

/// What to do when the primary lookup comes back empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Precise audiences report an empty result as is
    None,
    /// Try topic-labelled tokens, then a topic broadcast
    TenantTopics,
}

/// Per-kind resolution strategy
#[derive(Debug, Clone, Copy)]
pub struct AudienceStrategy {
    pub primary: AudienceSource,
    pub escalation: Escalation,
}

const STRATEGIES: [(NotificationKind, AudienceStrategy); 4] = [
    (
        NotificationKind::Direct,
        AudienceStrategy {
            primary: AudienceSource::OwnerTokens,
            escalation: Escalation::None,
        },
    ),
    (
        NotificationKind::Class,
        AudienceStrategy {
            primary: AudienceSource::ClassTokens,
            escalation: Escalation::None,
        },
    ),
    (
        NotificationKind::Role,
        AudienceStrategy {
            primary: AudienceSource::RoleTokens,
            escalation: Escalation::None,
        },
    ),
    (
        NotificationKind::Announcement,
        AudienceStrategy {
            primary: AudienceSource::TenantTokens,
            escalation: Escalation::TenantTopics,
        },
    ),
];

impl AudienceStrategy {
    pub fn for_kind(kind: NotificationKind) -> AudienceStrategy {
        STRATEGIES
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, strategy)| *strategy)
            .unwrap_or(AudienceStrategy {
                primary: AudienceSource::OwnerTokens,
                escalation: Escalation::None,
            })
    }
}

/// One registry lookup made while resolving
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionStep {
    pub source: AudienceSource,
    /// Human-readable description of what was looked up
    pub label: String,
    pub matched: usize,
}

/// Resolved audience plus the lookups that produced it
#[derive(Debug, Clone)]
pub struct Resolution {
    pub recipients: RecipientSet,
    /// Source of `recipients`
    pub source: AudienceSource,
    pub steps: Vec<ResolutionStep>,
}

impl Resolution {
    /// Nothing deliverable was found
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    /// The first lookup was empty and resolution moved on to a broader channel
    pub fn escalated(&self) -> bool {
        self.steps.len() > 1 && self.steps.first().map(|s| s.matched == 0).unwrap_or(false)
    }
}

/// Translates notification targets into recipient sets
pub struct AudienceResolver {
    registry: Arc<dyn DeviceTokenRegistry>,
    roster: Arc<dyn ClassRoster>,
    topic_prefix: String,
}

impl AudienceResolver {
    pub fn new(registry: Arc<dyn DeviceTokenRegistry>, roster: Arc<dyn ClassRoster>) -> Self {
        Self::with_topic_prefix(registry, roster, DEFAULT_TOPIC_PREFIX)
    }

    pub fn with_topic_prefix(
        registry: Arc<dyn DeviceTokenRegistry>,
        roster: Arc<dyn ClassRoster>,
        topic_prefix: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            roster,
            topic_prefix: topic_prefix.into(),
        }
    }

    /// Accepted topic names for a tenant, in the order they are tried:
    /// the bare tenant id, then the prefixed form.
    pub fn topic_candidates(&self, tenant_id: &str) -> Vec<String> {
        vec![tenant_id.to_string(), self.prefixed_topic(tenant_id)]
    }

    pub fn prefixed_topic(&self, tenant_id: &str) -> String {
        format!("{}{}", self.topic_prefix, tenant_id)
    }

    /// Resolve a notification's audience.
    ///
    /// Expects a notification whose selector was already validated. An empty
    /// token list is a normal result, not an error; only a registry failure is.
    /// Owner and class lookups stay within the notification's tenant.
    #[tracing::instrument(
        name = "resolver.resolve",
        skip(self, notification),
        fields(notification_id = %notification.id, kind = %notification.kind())
    )]
    pub async fn resolve(&self, notification: &Notification) -> Result<Resolution, DispatchError> {
        let strategy = AudienceStrategy::for_kind(notification.kind());
        let mut steps = Vec::new();

        let (label, filter) = self.primary_filter(notification).await?;
        let tokens = self.registry.find_active(&filter).await?;
        steps.push(ResolutionStep {
            source: strategy.primary,
            label,
            matched: tokens.len(),
        });

        if !tokens.is_empty() || strategy.escalation == Escalation::None {
            if tokens.is_empty() {
                tracing::debug!(
                    notification_id = %notification.id,
                    source = ?strategy.primary,
                    "Audience resolved to no active tokens"
                );
            }
            return Ok(Resolution {
                recipients: token_list(tokens),
                source: strategy.primary,
                steps,
            });
        }

        let tenant_id = notification.tenant_id.as_str();
        let topics = self.topic_candidates(tenant_id);
        let labelled = self
            .registry
            .find_active(&TokenFilter::Topics(topics.clone()))
            .await?;
        steps.push(ResolutionStep {
            source: AudienceSource::TopicLabelledTokens,
            label: format!("tokens labelled {}", topics.join(" | ")),
            matched: labelled.len(),
        });

        if !labelled.is_empty() {
            tracing::debug!(
                notification_id = %notification.id,
                tenant_id = %tenant_id,
                matched = labelled.len(),
                "No tenant tokens, using topic-labelled tokens"
            );
            return Ok(Resolution {
                recipients: token_list(labelled),
                source: AudienceSource::TopicLabelledTokens,
                steps,
            });
        }

        let topic = self.prefixed_topic(tenant_id);
        tracing::debug!(
            notification_id = %notification.id,
            tenant_id = %tenant_id,
            topic = %topic,
            "No enumerable tokens, falling back to topic broadcast"
        );

        Ok(Resolution {
            recipients: RecipientSet::topic(topic),
            source: AudienceSource::TopicBroadcast,
            steps,
        })
    }

    async fn primary_filter(
        &self,
        notification: &Notification,
    ) -> Result<(String, TokenFilter), DispatchError> {
        let tenant = notification.tenant_id.as_str();
        let resolved = match &notification.target {
            NotificationTarget::Direct { owner_id } => (
                format!("tokens of owner {} in {}", owner_id, tenant),
                TokenFilter::owner(tenant, owner_id.as_str()),
            ),
            NotificationTarget::Class { class_id } => {
                let members = self.roster.members(tenant, class_id).await?;
                (
                    format!(
                        "tokens of class {} in {} ({} members)",
                        class_id,
                        tenant,
                        members.len()
                    ),
                    TokenFilter::Owners {
                        tenant_id: tenant.to_string(),
                        owner_ids: members,
                    },
                )
            }
            NotificationTarget::Role { tenant_id, role } => (
                format!("tokens of role {} in {}", role, tenant_id),
                TokenFilter::Role {
                    tenant_id: tenant_id.clone(),
                    role: role.clone(),
                },
            ),
            NotificationTarget::Announcement { tenant_id } => (
                format!("tokens of tenant {}", tenant_id),
                TokenFilter::Tenant(tenant_id.clone()),
            ),
        };
        Ok(resolved)
    }
}

fn token_list(records: Vec<DeviceToken>) -> RecipientSet {
    RecipientSet::tokens(records.into_iter().map(|r| r.token).collect())
}
