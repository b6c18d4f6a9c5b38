use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Errors surfaced by the pipeline and the HTTP layer.
///
/// `Clone` because one in-flight retrieval result is handed to every
/// coalesced waiter of the range cache.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    /// Malformed payload from the telemetry source (missing fields,
    /// unparseable timestamps, non-JSON body).
    #[error("Structural error: {0}")]
    Structural(String),

    /// Transport or HTTP failure talking to the telemetry source.
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Fetch(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Structural(msg) => {
                tracing::warn!("Telemetry payload rejected: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::Config(msg) | AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Fetch("x".into()), StatusCode::BAD_GATEWAY),
            (AppError::Structural("x".into()), StatusCode::BAD_GATEWAY),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_display_includes_kind() {
        let err = AppError::Fetch("ThingSpeak returned HTTP 503".to_string());
        assert_eq!(err.to_string(), "Fetch error: ThingSpeak returned HTTP 503");
    }
}
