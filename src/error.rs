//! Error types for the storage layer and the service layer
//!
//! [`RepositoryError`] describes what the store reported. [`ServiceError`] is
//! the taxonomy callers see, and it knows how to render itself as an HTTP
//! response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Outcome of a failed repository operation
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The short code is already present in the link table
    #[error("short code `{0}` already exists")]
    Conflict(String),

    /// The caller went away before the write committed; nothing was written
    #[error("operation cancelled before commit")]
    Cancelled,

    /// Any failure of the underlying store or of record (de)serialization
    #[error("storage failure: {0}")]
    Storage(String),
}

macro_rules! storage_error_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for RepositoryError {
                fn from(err: $source) -> Self {
                    RepositoryError::Storage(err.to_string())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    serde_json::Error,
    tokio::task::JoinError,
);

/// Failure to hand off or persist one analytics event
///
/// These never reach a client; the redirect path logs them and moves on.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics queue is full, event dropped")]
    QueueFull,

    #[error("analytics queue is closed")]
    QueueClosed,

    #[error("analytics write timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

/// Errors surfaced by the shortening, resolution and analytics operations
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input; the client has to fix the request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested custom alias is already in use
    #[error("alias `{0}` is already taken")]
    AliasTaken(String),

    /// No link exists for the short code
    #[error("link `{0}` not found")]
    NotFound(String),

    /// The store failed; details are logged, never returned to the client
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The request did not finish within its deadline and was cancelled
    #[error("request did not complete within {0:?}")]
    Timeout(std::time::Duration),
}

impl ServiceError {
    /// Stable machine-readable code used in error bodies
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidRequest(_) => "invalid_request",
            ServiceError::AliasTaken(_) => "alias_taken",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Persistence(_) => "internal_error",
            ServiceError::Timeout(_) => "request_timeout",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::AliasTaken(_) => StatusCode::CONFLICT,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        ServiceError::Persistence(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let message = match &self {
            ServiceError::Persistence(detail) => {
                tracing::error!(error = %detail, "request failed in storage layer");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (
            self.status(),
            Json(json!({
                "error": message,
                "code": self.code(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServiceError::InvalidRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::AliasTaken("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Persistence("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::Timeout(std::time::Duration::from_millis(5)).status(),
            StatusCode::REQUEST_TIMEOUT
        );
    }

    #[test]
    fn test_repository_error_becomes_persistence() {
        let err: ServiceError = RepositoryError::Storage("disk full".into()).into();
        assert!(matches!(err, ServiceError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_persistence_detail_is_hidden_from_client() {
        let response = ServiceError::Persistence("table links_v1 corrupted".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "internal error");
        assert_eq!(body["code"], "internal_error");
    }
}
