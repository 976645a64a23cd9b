//! Notification dispatch endpoint.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::notification::{DispatchReport, Notification};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub issued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: DispatchReport,
}

/// POST /api/v1/notifications/dispatch - Deliver a notification now
///
/// Scheduling stays with the caller: whatever is posted here is due.
pub async fn dispatch_notification(
    State(state): State<AppState>,
    Json(mut notification): Json<Notification>,
) -> Result<Json<DispatchResponse>> {
    if let Some(scheduled_at) = notification.scheduled_at() {
        tracing::debug!(
            notification_id = %notification.id,
            scheduled_at = %scheduled_at,
            "Dispatching scheduled notification"
        );
    }

    let issued_at = Utc::now();
    notification.mark_issued(issued_at);

    let report = state.coordinator.dispatch(&notification).await?;

    Ok(Json(DispatchResponse { issued_at, report }))
}
