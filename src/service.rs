//! Link shortening and resolution
//!
//! [`ShorteningService`] validates input, takes a code from the
//! [`CodeAllocator`] and persists the link. [`ResolutionEngine`] maps a code
//! back to its destination and hands a click event to the analytics queue
//! without waiting for it to be written.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::allocator::CodeAllocator;
use crate::analytics::AnalyticsRecorder;
use crate::error::{RepositoryError, ServiceError};
use crate::model::{ClickEvent, ClickMeta, Link};
use crate::repository::Repository;

/// Longest accepted custom alias
pub const MAX_ALIAS_LEN: usize = 20;

/// Parses `raw` as an absolute URL with a host
///
/// The parsed form is what gets stored: the parser drops embedded tabs and
/// newlines and percent-encodes the rest, so the stored value is always a
/// valid `Location` header.
pub fn validate_url(raw: &str) -> Result<Url, ServiceError> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| ServiceError::InvalidRequest(format!("url is not a valid URL: {}", e)))?;

    if !parsed.has_host() {
        return Err(ServiceError::InvalidRequest(
            "url must be an absolute URL with a host".to_string(),
        ));
    }
    Ok(parsed)
}

/// Checks that an alias is 1-20 ASCII letters or digits
pub fn validate_alias(alias: &str) -> Result<(), ServiceError> {
    if alias.is_empty() || alias.len() > MAX_ALIAS_LEN {
        return Err(ServiceError::InvalidRequest(format!(
            "custom_alias must be 1-{} characters",
            MAX_ALIAS_LEN
        )));
    }
    if !alias.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ServiceError::InvalidRequest(
            "custom_alias must be alphanumeric".to_string(),
        ));
    }
    Ok(())
}

pub struct ShorteningService {
    repo: Arc<dyn Repository>,
    allocator: CodeAllocator,
    base_url: String,
    max_insert_attempts: usize,
}

impl ShorteningService {
    pub fn new(
        repo: Arc<dyn Repository>,
        allocator: CodeAllocator,
        base_url: impl Into<String>,
        max_insert_attempts: usize,
    ) -> Self {
        Self {
            repo,
            allocator,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_insert_attempts: max_insert_attempts.max(1),
        }
    }

    /// Full public URL for a short code
    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/s/{}", self.base_url, short_code)
    }

    /// Creates a link and returns its full short URL
    ///
    /// An empty alias is treated as absent. A uniqueness violation discovered
    /// at insert time maps to [`ServiceError::AliasTaken`] for aliases; for
    /// generated codes it counts as one more collision and allocation is
    /// retried, up to the configured bound.
    pub async fn shorten(
        &self,
        original_url: &str,
        custom_alias: Option<&str>,
    ) -> Result<String, ServiceError> {
        let destination = String::from(validate_url(original_url)?);

        let alias = custom_alias.filter(|alias| !alias.is_empty());
        if let Some(alias) = alias {
            validate_alias(alias)?;
        }

        for attempt in 1..=self.max_insert_attempts {
            let short_code = self.allocator.allocate(alias).await?;

            let link = Link {
                short_code: short_code.clone(),
                original_url: destination.clone(),
                custom_alias: alias.unwrap_or_default().to_string(),
                created_at: Utc::now(),
            };

            match self.repo.save_link(&link).await {
                Ok(()) => {
                    info!(short_code = %short_code, "link created");
                    return Ok(self.short_url(&short_code));
                }
                Err(RepositoryError::Conflict(code)) if alias.is_some() => {
                    debug!(short_code = %code, "alias claimed by a concurrent request");
                    return Err(ServiceError::AliasTaken(code));
                }
                Err(RepositoryError::Conflict(code)) => {
                    warn!(attempt, short_code = %code, "generated code taken at insert, retrying");
                }
                Err(err) => {
                    error!(error = %err, short_code = %short_code, "failed to save link");
                    return Err(err.into());
                }
            }
        }

        Err(ServiceError::Persistence(format!(
            "generated codes kept colliding after {} inserts",
            self.max_insert_attempts
        )))
    }
}

pub struct ResolutionEngine {
    repo: Arc<dyn Repository>,
    analytics: AnalyticsRecorder,
}

impl ResolutionEngine {
    pub fn new(repo: Arc<dyn Repository>, analytics: AnalyticsRecorder) -> Self {
        Self { repo, analytics }
    }

    /// Returns the link's destination and queues one click event
    ///
    /// `meta` must be captured from the request before calling. Failing to
    /// queue the click is logged and does not affect the result.
    pub async fn resolve(&self, short_code: &str, meta: ClickMeta) -> Result<String, ServiceError> {
        let link = self.lookup(short_code).await?;

        let click = ClickEvent::new(short_code, Utc::now(), meta);
        if let Err(err) = self.analytics.record(click) {
            warn!(error = %err, short_code, "failed to queue analytics");
        }

        Ok(link.original_url)
    }

    /// Fetches a link without recording a click
    pub async fn lookup(&self, short_code: &str) -> Result<Link, ServiceError> {
        if short_code.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "short code is required".to_string(),
            ));
        }

        match self.repo.get_link(short_code).await {
            Ok(Some(link)) => Ok(link),
            Ok(None) => Err(ServiceError::NotFound(short_code.to_string())),
            Err(err) => {
                error!(error = %err, short_code, "failed to get link");
                Err(err.into())
            }
        }
    }
}
