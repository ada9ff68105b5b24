//! Runtime configuration
//!
//! Values are read from the process environment once at startup. A `.env`
//! file, if present, is applied by `main` before [`Config::from_env`] runs.
//! Every key has a default; a key that is present but cannot be parsed is a
//! startup error rather than a silent fallback.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Error raised while reading configuration from the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the analytics pipeline
#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    /// Bound of the work queue between redirects and the writer task
    pub queue_capacity: usize,

    /// Timeout applied to each individual analytics write
    pub write_timeout: Duration,

    /// Number of recent clicks returned by the analytics endpoint
    pub recent_limit: usize,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            write_timeout: Duration::from_millis(2000),
            recent_limit: 10,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on (all interfaces)
    pub http_port: u16,

    /// Public prefix of generated short URLs, without a trailing slash
    pub base_url: String,

    /// Path of the embedded database file
    pub database_path: String,

    /// Deadline applied to every inbound request
    pub request_timeout: Duration,

    /// Upper bound on attempts to find an unused generated code
    pub code_generation_attempts: usize,

    /// How long shutdown waits for queued analytics to be written
    pub shutdown_drain_timeout: Duration,

    pub analytics: AnalyticsSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            base_url: "http://localhost:8080".to_string(),
            database_path: "data.db".to_string(),
            request_timeout: Duration::from_millis(5000),
            code_generation_attempts: 16,
            shutdown_drain_timeout: Duration::from_millis(5000),
            analytics: AnalyticsSettings::default(),
        }
    }
}

impl Config {
    /// Builds the configuration from environment variables
    ///
    /// # Environment Variables
    ///
    /// - `HTTP_PORT` - Server port (default: 8080)
    /// - `BASE_URL` - Prefix for returned short URLs (default: "http://localhost:8080")
    /// - `DATABASE_PATH` - Database file (default: "data.db")
    /// - `REQUEST_TIMEOUT_MS` - Inbound request deadline (default: 5000)
    /// - `ANALYTICS_QUEUE_CAPACITY` - Analytics queue bound (default: 1024)
    /// - `ANALYTICS_WRITE_TIMEOUT_MS` - Per-write analytics timeout (default: 2000)
    /// - `ANALYTICS_RECENT_LIMIT` - Recent clicks in analytics responses (default: 10)
    /// - `CODE_GENERATION_ATTEMPTS` - Generated-code retry bound (default: 16)
    /// - `SHUTDOWN_DRAIN_TIMEOUT_MS` - Analytics drain time on shutdown (default: 5000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let base_url = lookup("BASE_URL")
            .unwrap_or(defaults.base_url)
            .trim_end_matches('/')
            .to_string();

        let config = Config {
            http_port: parse_or(&lookup, "HTTP_PORT", defaults.http_port)?,
            base_url,
            database_path: lookup("DATABASE_PATH").unwrap_or(defaults.database_path),
            request_timeout: millis_or(&lookup, "REQUEST_TIMEOUT_MS", defaults.request_timeout)?,
            code_generation_attempts: positive_or(
                &lookup,
                "CODE_GENERATION_ATTEMPTS",
                defaults.code_generation_attempts,
            )?,
            shutdown_drain_timeout: millis_or(
                &lookup,
                "SHUTDOWN_DRAIN_TIMEOUT_MS",
                defaults.shutdown_drain_timeout,
            )?,
            analytics: AnalyticsSettings {
                queue_capacity: positive_or(
                    &lookup,
                    "ANALYTICS_QUEUE_CAPACITY",
                    defaults.analytics.queue_capacity,
                )?,
                write_timeout: millis_or(
                    &lookup,
                    "ANALYTICS_WRITE_TIMEOUT_MS",
                    defaults.analytics.write_timeout,
                )?,
                recent_limit: parse_or(
                    &lookup,
                    "ANALYTICS_RECENT_LIMIT",
                    defaults.analytics.recent_limit,
                )?,
            },
        };

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn positive_or<F>(lookup: &F, key: &'static str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

fn millis_or<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(lookup, key, default_ms).map(Duration::from_millis)
}
