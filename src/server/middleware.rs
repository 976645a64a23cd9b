use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use super::AppState;
use crate::error::AppError;

/// Header carrying the shared key for `/api/v1` routes
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Reject `/api/v1` calls whose key does not match `api.key`.
///
/// With no key configured (or an empty one) every call is let through.
/// Rejections use the same `{error:{code,message}}` body as the handlers.
pub async fn api_key_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state.settings.api.key.as_deref().filter(|k| !k.is_empty());
    let Some(expected) = expected else {
        return Ok(next.run(req).await);
    };

    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(key) if key == expected => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!(path = %req.uri().path(), "Rejected request with wrong API key");
            Err(AppError::Unauthorized("Invalid API key"))
        }
        None => {
            tracing::warn!(path = %req.uri().path(), "Rejected request without API key");
            Err(AppError::Unauthorized("Missing API key"))
        }
    }
}
