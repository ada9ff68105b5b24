//! Data models for the URL shortener
//!
//! This module defines the stored records ([`Link`], [`AnalyticsEvent`]), the
//! click data handed to the analytics pipeline, and the JSON request/response
//! bodies of the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shortened link as stored in the link table
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Unique short code (primary key), 1-20 characters
    pub short_code: String,

    /// Destination the short code redirects to
    pub original_url: String,

    /// Caller-supplied alias; empty when the code was generated
    #[serde(default)]
    pub custom_alias: String,

    /// Creation time, set once before the first write
    pub created_at: DateTime<Utc>,
}

/// Request metadata captured while the inbound request is still alive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickMeta {
    pub user_agent: String,
    pub referer: String,
}

/// A click waiting to be persisted; the store assigns its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub short_code: String,
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    pub referer: String,
}

impl ClickEvent {
    pub fn new(short_code: impl Into<String>, timestamp: DateTime<Utc>, meta: ClickMeta) -> Self {
        Self {
            short_code: short_code.into(),
            timestamp,
            user_agent: meta.user_agent,
            referer: meta.referer,
        }
    }
}

/// A persisted access event
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsEvent {
    /// Monotonically assigned surrogate id
    pub id: u64,

    /// Soft reference to the link that was accessed
    pub short_code: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub user_agent: String,

    #[serde(default)]
    pub referer: String,
}

impl AnalyticsEvent {
    pub fn from_click(id: u64, click: &ClickEvent) -> Self {
        Self {
            id,
            short_code: click.short_code.clone(),
            timestamp: click.timestamp,
            user_agent: click.user_agent.clone(),
            referer: click.referer.clone(),
        }
    }
}

/// Request payload for `POST /api/shorten`
///
/// # Example
/// ```json
/// {
///   "url": "https://example.com/very/long/url",
///   "custom_alias": "mylink"
/// }
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct ShortenRequest {
    /// The URL to shorten; must be an absolute URL
    pub url: String,

    /// Optional alphanumeric alias of at most 20 characters
    #[serde(default)]
    pub custom_alias: Option<String>,
}

/// Response returned after a link is created
#[derive(Serialize, Deserialize, Debug)]
pub struct ShortenResponse {
    pub short_url: String,
}

/// One entry in the `recent_clicks` list
#[derive(Serialize, Deserialize, Debug)]
pub struct ClickItem {
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    pub referer: String,
}

impl From<AnalyticsEvent> for ClickItem {
    fn from(event: AnalyticsEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            user_agent: event.user_agent,
            referer: event.referer,
        }
    }
}

/// Response body of `GET /api/analytics/{code}`
#[derive(Serialize, Deserialize, Debug)]
pub struct AnalyticsResponse {
    pub short_url: String,
    pub total_clicks: u64,
    pub recent_clicks: Vec<ClickItem>,
}
