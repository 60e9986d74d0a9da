use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use types::prelude::EngineError;

/// Central error type for the gateway application
#[derive(Debug)]
pub enum AppError {
    Unauthorized(String),
    RateLimitExceeded(String),
    UnprocessableEntity(String),
    NotFound(String),
    ServiceUnavailable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED"),
            AppError::RateLimitExceeded(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, msg, "RATE_LIMIT_EXCEEDED")
            }
            AppError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg, "UNPROCESSABLE_ENTITY")
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg, "SERVICE_UNAVAILABLE")
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

// Validation and state errors surface verbatim as 422; missing entities are
// 404; lock-wait timeouts are retriable 503; everything unexpected is 500.
impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound { .. } => AppError::NotFound(err.to_string()),
            EngineError::Transient(_) => AppError::ServiceUnavailable(err.to_string()),
            EngineError::Internal(_) => AppError::Internal(anyhow::anyhow!(err.to_string())),
            EngineError::Validation(_)
            | EngineError::InsufficientBalance { .. }
            | EngineError::InsufficientAssets { .. }
            | EngineError::InsufficientLocked { .. }
            | EngineError::OwnershipViolation { .. }
            | EngineError::IllegalState { .. }
            | EngineError::UnsupportedPartialMatch { .. } => {
                AppError::UnprocessableEntity(err.to_string())
            }
        }
    }
}
