//! PostgreSQL-backed device token registry.
//!
//! Uses the `device_tokens` and `class_members` tables from
//! `migrations/001_device_tokens.sql`. Upserts rely on the unique index on
//! `device_tokens.token`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::metrics::RegistryMetrics;

use super::backend::{ClassRoster, DeviceTokenRegistry, RegistryError};
use super::types::{
    DeviceKind, DeviceToken, RegistryStats, TokenFilter, TokenRegistration, UpsertedToken,
};

const SELECT_COLUMNS: &str = "id, owner_id, tenant_id, role, token, topic, device_kind, \
     is_active, created_at, updated_at";

#[derive(Debug, FromRow)]
struct DeviceTokenRow {
    id: Uuid,
    owner_id: String,
    tenant_id: String,
    role: String,
    token: String,
    topic: Option<String>,
    device_kind: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DeviceTokenRow> for DeviceToken {
    fn from(row: DeviceTokenRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            tenant_id: row.tenant_id,
            role: row.role,
            token: row.token,
            topic: row.topic,
            device_kind: DeviceKind::parse(&row.device_kind),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL token registry.
pub struct PostgresTokenRegistry {
    pool: PgPool,
}

impl PostgresTokenRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceTokenRegistry for PostgresTokenRegistry {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn upsert(&self, registration: TokenRegistration) -> Result<UpsertedToken, RegistryError> {
        registration.validate()?;

        // `xmax = 0` is only true for a freshly inserted row
        let (row, inserted): (DeviceTokenRow, bool) = {
            let query = format!(
                r#"
                INSERT INTO device_tokens
                    (id, owner_id, tenant_id, role, token, topic, device_kind, is_active, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, NOW(), NOW())
                ON CONFLICT (token) DO UPDATE SET
                    owner_id = EXCLUDED.owner_id,
                    tenant_id = EXCLUDED.tenant_id,
                    role = EXCLUDED.role,
                    topic = EXCLUDED.topic,
                    device_kind = COALESCE($8, device_tokens.device_kind),
                    is_active = TRUE,
                    updated_at = NOW()
                RETURNING {}, (xmax = 0) AS inserted
                "#,
                SELECT_COLUMNS
            );

            let kind = registration.device_kind.map(|k| k.as_str());
            let record = sqlx::query(&query)
                .bind(Uuid::new_v4())
                .bind(&registration.owner_id)
                .bind(&registration.tenant_id)
                .bind(&registration.role)
                .bind(&registration.token)
                .bind(&registration.topic)
                .bind(kind.unwrap_or(DeviceKind::Unknown.as_str()))
                .bind(kind)
                .fetch_one(&self.pool)
                .await?;

            use sqlx::Row;
            let inserted: bool = record.try_get("inserted")?;
            (DeviceTokenRow::from_row(&record)?, inserted)
        };

        RegistryMetrics::record_registration(inserted);

        let token = DeviceToken::from(row);
        tracing::debug!(
            token_id = %token.id,
            owner_id = %token.owner_id,
            tenant_id = %token.tenant_id,
            token = %token.redacted(),
            inserted,
            "Device token upserted"
        );

        Ok(UpsertedToken {
            token,
            created: inserted,
        })
    }

    async fn set_active(&self, token_id: Uuid, is_active: bool) -> Result<(), RegistryError> {
        let result = sqlx::query(
            "UPDATE device_tokens SET is_active = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(token_id)
        .bind(is_active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound(token_id));
        }

        tracing::debug!(token_id = %token_id, is_active, "Device token active flag set");
        Ok(())
    }

    async fn get(&self, token_id: Uuid) -> Result<DeviceToken, RegistryError> {
        let query = format!("SELECT {} FROM device_tokens WHERE id = $1", SELECT_COLUMNS);
        sqlx::query_as::<_, DeviceTokenRow>(&query)
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await?
            .map(DeviceToken::from)
            .ok_or(RegistryError::NotFound(token_id))
    }

    async fn find_active(&self, filter: &TokenFilter) -> Result<Vec<DeviceToken>, RegistryError> {
        let base = format!("SELECT {} FROM device_tokens WHERE is_active", SELECT_COLUMNS);

        let rows = match filter {
            TokenFilter::Owner { tenant_id, owner_id } => {
                sqlx::query_as::<_, DeviceTokenRow>(&format!(
                    "{} AND tenant_id = $1 AND owner_id = $2",
                    base
                ))
                .bind(tenant_id)
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?
            }
            TokenFilter::Owners {
                tenant_id,
                owner_ids,
            } => {
                sqlx::query_as::<_, DeviceTokenRow>(&format!(
                    "{} AND tenant_id = $1 AND owner_id = ANY($2)",
                    base
                ))
                .bind(tenant_id)
                .bind(owner_ids)
                .fetch_all(&self.pool)
                .await?
            }
            TokenFilter::Role { tenant_id, role } => {
                sqlx::query_as::<_, DeviceTokenRow>(&format!(
                    "{} AND tenant_id = $1 AND role = $2",
                    base
                ))
                .bind(tenant_id)
                .bind(role)
                .fetch_all(&self.pool)
                .await?
            }
            TokenFilter::Tenant(tenant_id) => {
                sqlx::query_as::<_, DeviceTokenRow>(&format!("{} AND tenant_id = $1", base))
                    .bind(tenant_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            TokenFilter::Topics(topics) => {
                sqlx::query_as::<_, DeviceTokenRow>(&format!("{} AND topic = ANY($1)", base))
                    .bind(topics)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.into_iter().map(DeviceToken::from).collect())
    }

    async fn stats(&self) -> Result<RegistryStats, RegistryError> {
        let (total, active): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM device_tokens",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(RegistryStats {
            backend_type: self.backend_type().to_string(),
            total_tokens: total as usize,
            active_tokens: active as usize,
        })
    }
}

/// Class membership read from the CRUD layer's `class_members` table.
pub struct PostgresClassRoster {
    pool: PgPool,
}

impl PostgresClassRoster {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClassRoster for PostgresClassRoster {
    async fn members(&self, tenant_id: &str, class_id: &str) -> Result<Vec<String>, RegistryError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT owner_id FROM class_members WHERE tenant_id = $1 AND class_id = $2",
        )
        .bind(tenant_id)
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(owner_id,)| owner_id).collect())
    }
}
