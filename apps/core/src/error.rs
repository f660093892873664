use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::io;
use thiserror::Error;

/// Application-wide error type, consolidating all possible errors into a single enum.
#[derive(Debug, Error)]
pub enum AppError {
    /// Represents errors originating from the database, typically from `sqlx`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents standard input/output errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Represents errors specific to the actor system, such as communication failures.
    #[error("Actor error: {0}")]
    Actor(#[from] crate::actors::messages::ActorError),

    /// Represents data validation errors (e.g., invalid input format).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Represents configuration-related errors (e.g., missing environment variables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Represents unexpected internal errors that indicate a bug.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Represents errors from operations that did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Represents an error indicating that a rate limit has been exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Represents a lookup that matched nothing (interaction, session).
    #[error("{0}")]
    NotFound(String),

    /// Represents a rejected upload that exceeds the configured size cap.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Represents an upload whose media type is not accepted.
    #[error("{0}")]
    UnsupportedMediaType(String),

    /// Represents a failure reported by the upstream generation API. The raw
    /// message is kept so quota responses can be recognized at the boundary.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::Database(e) => AppError::Database(sqlx::Error::Protocol(e.to_string())),
            AppError::Io(e) => AppError::Io(io::Error::new(e.kind(), e.to_string())),
            AppError::Actor(e) => AppError::Actor(e.clone()),
            AppError::Validation(s) => AppError::Validation(s.clone()),
            AppError::Config(s) => AppError::Config(s.clone()),
            AppError::Internal(s) => AppError::Internal(s.clone()),
            AppError::Timeout(s) => AppError::Timeout(s.clone()),
            AppError::RateLimited => AppError::RateLimited,
            AppError::NotFound(s) => AppError::NotFound(s.clone()),
            AppError::PayloadTooLarge(s) => AppError::PayloadTooLarge(s.clone()),
            AppError::UnsupportedMediaType(s) => AppError::UnsupportedMediaType(s.clone()),
            AppError::Upstream(s) => AppError::Upstream(s.clone()),
        }
    }
}

/// Maps every error to the JSON envelope the HTTP surface returns:
/// `{"success": false, "error": <message>, "code": <status>}`.
///
/// Upstream failures are matched on their message text: anything mentioning
/// "quota" or "429" becomes HTTP 429 with a stable user-facing message, the
/// rest surface as HTTP 500 carrying the raw error string.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            AppError::UnsupportedMediaType(msg) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg.clone())
            }
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Please try again later.".to_string(),
            ),
            AppError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg.clone()),
            AppError::Upstream(msg) => {
                if msg.to_lowercase().contains("quota") || msg.contains("429") {
                    (
                        StatusCode::TOO_MANY_REQUESTS,
                        "API quota exceeded. Please wait a moment and try again.".to_string(),
                    )
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", msg))
                }
            }
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": message,
            "code": status.as_u16(),
        }));
        (status, body).into_response()
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout(format!("Operation timed out: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Io(io::Error::other(format!("HTTP error: {}", err)))
    }
}

impl From<fastembed::Error> for AppError {
    fn from(err: fastembed::Error) -> Self {
        AppError::Internal(format!("Embedding error: {}", err))
    }
}

impl From<lancedb::Error> for AppError {
    fn from(err: lancedb::Error) -> Self {
        AppError::Database(sqlx::Error::Protocol(format!("LanceDB error: {}", err)))
    }
}

impl From<arrow::error::ArrowError> for AppError {
    fn from(err: arrow::error::ArrowError) -> Self {
        AppError::Internal(format!("Arrow error: {}", err))
    }
}
