//! Error types for lyra-gen

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::Phase;
use crate::services::suno_client::ProviderError;
use crate::utils::Transient;

/// Lifecycle manager errors
#[derive(Debug, Error)]
pub enum GenError {
    #[error("Song not found: {0}")]
    SongNotFound(String),

    /// Phase already retried the maximum number of times (nothing mutated)
    #[error("Retry limit exceeded for {phase} phase (max {max})")]
    RetryLimitExceeded { phase: Phase, max: u32 },

    #[error("Lyrics variant index {index} out of range ({len} variants)")]
    VariantOutOfRange { index: usize, len: usize },

    /// Operation not allowed in the song's current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Provider accepted the job but its task ID could not be stored.
    /// A callback addressed by song ID still reconciles it.
    #[error("{phase} task {task_id} accepted by provider but not recorded: {source}")]
    UnrecordedTask {
        phase: Phase,
        task_id: String,
        #[source]
        source: Box<GenError>,
    },

    #[error(transparent)]
    Common(#[from] lyra_common::Error),
}

impl From<sqlx::Error> for GenError {
    fn from(err: sqlx::Error) -> Self {
        GenError::Common(lyra_common::Error::Database(err))
    }
}

impl Transient for GenError {
    fn is_transient(&self) -> bool {
        match self {
            GenError::Common(err) => err.is_transient(),
            _ => false,
        }
    }
}

pub type GenResult<T> = Result<T, GenError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or invalid session (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict (409) - operation not valid in current song status
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Retry budget exhausted (429)
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    /// Upstream provider failed (502)
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// lyra-common error
    #[error("Common error: {0}")]
    Common(#[from] lyra_common::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<GenError> for ApiError {
    fn from(err: GenError) -> Self {
        match err {
            GenError::SongNotFound(id) => ApiError::NotFound(format!("Song not found: {}", id)),
            e @ GenError::RetryLimitExceeded { .. } => ApiError::TooManyRequests(e.to_string()),
            e @ GenError::VariantOutOfRange { .. } => ApiError::BadRequest(e.to_string()),
            GenError::InvalidState(msg) => ApiError::Conflict(msg),
            GenError::Provider(e) => ApiError::BadGateway(e.to_string()),
            e @ GenError::UnrecordedTask { .. } => ApiError::Internal(e.to_string()),
            GenError::Common(lyra_common::Error::NotFound(msg)) => ApiError::NotFound(msg),
            GenError::Common(lyra_common::Error::InvalidInput(msg)) => ApiError::BadRequest(msg),
            GenError::Common(lyra_common::Error::Conflict(msg)) => ApiError::Conflict(msg),
            GenError::Common(e) => ApiError::Common(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::TooManyRequests(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "RETRY_LIMIT_EXCEEDED", msg)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, message = %message, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
