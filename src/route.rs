//! Route definitions and shared application state
//!
//! This module wires the services together into [`AppState`] and builds the
//! Axum router that exposes them.

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::task::JoinHandle;

use crate::allocator::{CodeAllocator, CodeGenerator, RandomCodeGenerator};
use crate::analytics::AnalyticsRecorder;
use crate::config::Config;
use crate::handler::{get_analytics, missing_short_code, redirect_url, shorten_url};
use crate::middleware::request_deadline;
use crate::repository::Repository;
use crate::service::{ResolutionEngine, ShorteningService};

/// Application state shared across all request handlers
///
/// Holds only stateless services and handles; all mutable state lives in the
/// store and in the analytics queue.
#[derive(Clone)]
pub struct AppState {
    pub shortener: Arc<ShorteningService>,
    pub resolver: Arc<ResolutionEngine>,
    pub analytics: AnalyticsRecorder,
    pub recent_limit: usize,
    pub request_timeout: Duration,
}

impl AppState {
    /// Builds the services on top of `repo` and spawns the analytics writer
    ///
    /// The returned handle completes once every clone of the state has been
    /// dropped and queued events have been written.
    pub fn new(repo: Arc<dyn Repository>, config: &Config) -> (Self, JoinHandle<()>) {
        Self::with_generator(repo, config, Arc::new(RandomCodeGenerator))
    }

    pub fn with_generator(
        repo: Arc<dyn Repository>,
        config: &Config,
        generator: Arc<dyn CodeGenerator>,
    ) -> (Self, JoinHandle<()>) {
        let (analytics, writer) = AnalyticsRecorder::spawn(Arc::clone(&repo), &config.analytics);

        let allocator = CodeAllocator::new(
            Arc::clone(&repo),
            generator,
            config.code_generation_attempts,
        );
        let shortener = ShorteningService::new(
            Arc::clone(&repo),
            allocator,
            config.base_url.clone(),
            config.code_generation_attempts,
        );
        let resolver = ResolutionEngine::new(repo, analytics.clone());

        let state = AppState {
            shortener: Arc::new(shortener),
            resolver: Arc::new(resolver),
            analytics,
            recent_limit: config.analytics.recent_limit,
            request_timeout: config.request_timeout,
        };

        (state, writer)
    }
}

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// - `POST /api/shorten` - Creates a short URL
/// - `GET /s/{code}` - Redirects to the original URL
/// - `GET /api/analytics/{code}` - Click totals and recent clicks
///
/// Every request runs under the configured request deadline.
///
/// # Example Usage
///
/// ```no_run
/// # use std::sync::Arc;
/// # use shortlink::config::Config;
/// # use shortlink::database::init_db;
/// # use shortlink::repository::RedbRepository;
/// # use shortlink::route::{create_app, AppState};
/// # async fn run() {
/// let config = Config::default();
/// let db = init_db(&config.database_path).unwrap();
/// let (state, _writer) = AppState::new(Arc::new(RedbRepository::new(Arc::new(db))), &config);
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// # }
/// ```
pub fn create_app(state: AppState) -> Router {
    let request_timeout = state.request_timeout;

    let api_routes = Router::new()
        .route("/shorten", post(shorten_url))
        .route("/analytics/", get(missing_short_code))
        .route("/analytics/{code}", get(get_analytics));

    Router::new()
        .route("/s/", get(missing_short_code))
        .route("/s/{code}", get(redirect_url))
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            request_timeout,
            request_deadline,
        ))
        .with_state(state)
}
