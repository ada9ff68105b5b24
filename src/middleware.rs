use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::error::ServiceError;

/// Middleware enforcing the per-request deadline
///
/// When the deadline passes, the handler future is dropped, which cancels any
/// storage call it is awaiting (uncommitted writes roll back), and the client
/// receives a `408` with the usual JSON error body.
pub async fn request_deadline(
    State(deadline): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match tokio::time::timeout(deadline, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%method, path = %path, ?deadline, "request cancelled at deadline");
            ServiceError::Timeout(deadline).into_response()
        }
    }
}
