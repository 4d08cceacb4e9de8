//! Error types for triptych-curator
//!
//! - [`CurationError`]: pipeline failures (generation, store, missing arc)
//! - [`ApiError`]: HTTP boundary, rendered as `{"error": {code, message}}`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::generation_client::GenerationError;
use crate::types::ResolverError;

/// Curation pipeline error
///
/// Resolution failures and coherence issues never surface here; they degrade
/// inside the pipeline. Any of these variants aborts the invocation before a
/// bundle is persisted.
#[derive(Debug, Error)]
pub enum CurationError {
    /// The user has no arc without a completion date
    #[error("No active arc for user {0}")]
    NoActiveArc(String),

    /// Seeding refused because the user already has an active arc
    #[error("Arc {0} is already active")]
    ArcAlreadyActive(uuid::Uuid),

    /// Generation call failed (transport or malformed response)
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// Store failure
    #[error("Store error: {0}")]
    Store(#[from] triptych_common::Error),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409), e.g. no active arc or an arc already active
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upstream service failed (502)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// triptych-common error
    #[error("Common error: {0}")]
    Common(#[from] triptych_common::Error),
}

impl From<CurationError> for ApiError {
    fn from(err: CurationError) -> Self {
        match err {
            CurationError::NoActiveArc(user) => {
                ApiError::Conflict(format!("No active arc for user {}", user))
            }
            CurationError::ArcAlreadyActive(id) => {
                ApiError::Conflict(format!("Arc {} is already active", id))
            }
            CurationError::Generation(e) => ApiError::Upstream(e.to_string()),
            CurationError::Store(e) => ApiError::Common(e),
        }
    }
}

impl From<ResolverError> for ApiError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::NotAvailable(msg) => ApiError::Conflict(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Common(triptych_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(triptych_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

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
