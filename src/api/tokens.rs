//! Device token registration endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::registry::{DeviceKind, DeviceToken, TokenRegistration, UpsertedToken};
use crate::server::AppState;

/// Registry record as exposed over HTTP; the raw token is never echoed back
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub id: Uuid,
    pub owner_id: String,
    pub tenant_id: String,
    pub role: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub device_kind: DeviceKind,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DeviceToken> for TokenResponse {
    fn from(token: DeviceToken) -> Self {
        Self {
            token: token.redacted(),
            id: token.id,
            owner_id: token.owner_id,
            tenant_id: token.tenant_id,
            role: token.role,
            topic: token.topic,
            device_kind: token.device_kind,
            is_active: token.is_active,
            created_at: token.created_at,
            updated_at: token.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// POST /api/v1/device-tokens - Register or refresh a device token
///
/// 201 for a new record, 200 when an existing token was updated.
pub async fn register_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRegistration>,
) -> Result<(StatusCode, Json<TokenResponse>)> {
    let UpsertedToken { token, created } = state.registry.upsert(request).await?;

    tracing::info!(
        token_id = %token.id,
        owner_id = %token.owner_id,
        tenant_id = %token.tenant_id,
        created,
        "Device token registered"
    );

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(token.into())))
}

/// PUT /api/v1/device-tokens/{id}/active - Revoke or restore a device token
pub async fn set_token_active(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetActiveRequest>,
) -> Result<StatusCode> {
    state.registry.set_active(id, request.is_active).await?;

    tracing::info!(token_id = %id, is_active = request.is_active, "Device token active flag updated");

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/device-tokens/{id} - Fetch a device token record
pub async fn get_token(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TokenResponse>> {
    let token = state.registry.get(id).await?;
    Ok(Json(token.into()))
}
