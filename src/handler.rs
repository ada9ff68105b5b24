//! HTTP request handlers for the URL shortener API
//!
//! Handlers only translate between HTTP and the services: they extract
//! input, capture request metadata, and render results or
//! [`ServiceError`]s as responses.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ServiceError;
use crate::model::{AnalyticsResponse, ClickItem, ClickMeta, ShortenRequest, ShortenResponse};
use crate::route::AppState;

/// Creates a new short URL
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://example.com/very/long/url",
///   "custom_alias": "mylink"  // Optional
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - `{"short_url": "http://localhost:8080/s/mylink"}`
/// - **400 Bad Request** - Malformed body, invalid URL or alias
/// - **409 Conflict** - Custom alias already exists
/// - **500 Internal Server Error** - Storage failure
pub async fn shorten_url(
    State(state): State<AppState>,
    payload: Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(payload) = payload.map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;

    let short_url = state
        .shortener
        .shorten(&payload.url, payload.custom_alias.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(ShortenResponse { short_url })))
}

/// Redirects a short code to its original destination
///
/// User agent and referer are read here, while the request is still alive,
/// and travel with the click event to the analytics writer.
///
/// # Response
///
/// - **302 Found** - `Location` set to the original URL
/// - **404 Not Found** - Unknown short code
pub async fn redirect_url(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let meta = click_meta(&headers);
    let original_url = state.resolver.resolve(&short_code, meta).await?;

    Ok((StatusCode::FOUND, [(header::LOCATION, original_url)]).into_response())
}

/// Returns click totals and the most recent clicks of a short code
///
/// # Response
///
/// ```json
/// {
///   "short_url": "mylink",
///   "total_clicks": 42,
///   "recent_clicks": [
///     {"timestamp": "2026-01-17T13:40:00Z", "user_agent": "curl/8.0", "referer": ""}
///   ]
/// }
/// ```
///
/// - **404 Not Found** - Unknown short code
pub async fn get_analytics(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AnalyticsResponse>, ServiceError> {
    let link = state.resolver.lookup(&short_code).await?;

    let total_clicks = state.analytics.count(&link.short_code).await?;
    let recent = state
        .analytics
        .recent(&link.short_code, state.recent_limit)
        .await?;

    Ok(Json(AnalyticsResponse {
        short_url: link.short_code,
        total_clicks,
        recent_clicks: recent.into_iter().map(ClickItem::from).collect(),
    }))
}

/// Fallback for `/s/` and `/api/analytics/` without a code
pub async fn missing_short_code() -> ServiceError {
    ServiceError::InvalidRequest("short code is required".to_string())
}

fn click_meta(headers: &HeaderMap) -> ClickMeta {
    let read = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    ClickMeta {
        user_agent: read(header::USER_AGENT),
        referer: read(header::REFERER),
    }
}
