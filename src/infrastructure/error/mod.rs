use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::notification::DispatchError;
use crate::registry::RegistryError;

/// Errors surfaced by HTTP handlers and middleware
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

/// Hide internal details from clients in production
fn masked(log_message: &str, public: &str) -> String {
    if is_production() {
        public.to_string()
    } else {
        log_message.to_string()
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        let log_message = self.to_string();
        match self {
            AppError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", reason.to_string())
            }
            AppError::Dispatch(DispatchError::InvalidSelector(msg)) => {
                (StatusCode::BAD_REQUEST, "INVALID_SELECTOR", msg.clone())
            }
            AppError::Dispatch(DispatchError::ProviderUnavailable(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "PROVIDER_UNAVAILABLE",
                masked(&log_message, "Push provider unavailable"),
            ),
            AppError::Dispatch(DispatchError::Registry(e)) => registry_parts(e, &log_message),
            AppError::Registry(e) => registry_parts(e, &log_message),
        }
    }
}

fn registry_parts(error: &RegistryError, log_message: &str) -> (StatusCode, &'static str, String) {
    match error {
        RegistryError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Device token {} not found", id),
        ),
        RegistryError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        RegistryError::Postgres(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "REGISTRY_ERROR",
            masked(log_message, "Service temporarily unavailable"),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, client_message) = self.parts();

        // Always log the detailed error server-side
        if status.is_server_error() {
            tracing::error!(code = %code, status = %status.as_u16(), message = %self, "API error");
        } else {
            tracing::warn!(code = %code, status = %status.as_u16(), message = %self, "API error");
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let invalid = AppError::from(DispatchError::InvalidSelector("missing owner_id".into()));
        assert_eq!(invalid.parts().0, StatusCode::BAD_REQUEST);
        assert_eq!(invalid.parts().1, "INVALID_SELECTOR");

        let unavailable = AppError::from(DispatchError::ProviderUnavailable("disabled".into()));
        assert_eq!(unavailable.parts().0, StatusCode::SERVICE_UNAVAILABLE);

        let missing = AppError::from(RegistryError::NotFound(Uuid::nil()));
        assert_eq!(missing.parts().0, StatusCode::NOT_FOUND);

        let nested = AppError::from(DispatchError::Registry(RegistryError::Validation("x".into())));
        assert_eq!(nested.parts().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unauthorized_mapping() {
        let (status, code, message) = AppError::Unauthorized("Missing API key").parts();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "UNAUTHORIZED");
        assert_eq!(message, "Missing API key");
    }

    #[test]
    fn test_into_response_status() {
        let response = AppError::from(RegistryError::NotFound(Uuid::nil())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
