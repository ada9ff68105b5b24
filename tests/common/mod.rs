//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use redb::Database;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use shortlink::config::Config;
use shortlink::database::init_db;
use shortlink::error::RepositoryError;
use shortlink::model::{AnalyticsEvent, ClickEvent, Link};
use shortlink::repository::{RedbRepository, Repository};
use shortlink::route::{create_app, AppState};

/// How long a stalled lookup hangs
pub const STALL: Duration = Duration::from_secs(1);

/// Wraps the redb repository, counts calls and injects faults on demand
pub struct InstrumentedRepository {
    inner: RedbRepository,
    pub fail_get_link: AtomicBool,
    /// Makes `get_link` hang for [`STALL`] before answering
    pub stall_get_link: AtomicBool,
    pub fail_analytics: AtomicBool,
    /// Makes `link_exists` always answer `false`, as if the check lost a race
    pub stale_exists: AtomicBool,
    pub analytics_writes: AtomicUsize,
}

impl InstrumentedRepository {
    pub fn new(inner: RedbRepository) -> Self {
        Self {
            inner,
            fail_get_link: AtomicBool::new(false),
            stall_get_link: AtomicBool::new(false),
            fail_analytics: AtomicBool::new(false),
            stale_exists: AtomicBool::new(false),
            analytics_writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Repository for InstrumentedRepository {
    async fn save_link(&self, link: &Link) -> Result<(), RepositoryError> {
        self.inner.save_link(link).await
    }

    async fn get_link(&self, short_code: &str) -> Result<Option<Link>, RepositoryError> {
        if self.fail_get_link.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("injected read failure".to_string()));
        }
        if self.stall_get_link.load(Ordering::SeqCst) {
            tokio::time::sleep(STALL).await;
        }
        self.inner.get_link(short_code).await
    }

    async fn link_exists(&self, short_code: &str) -> Result<bool, RepositoryError> {
        if self.stale_exists.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.link_exists(short_code).await
    }

    async fn save_analytics(&self, click: &ClickEvent) -> Result<u64, RepositoryError> {
        self.analytics_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_analytics.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("injected write failure".to_string()));
        }
        self.inner.save_analytics(click).await
    }

    async fn get_analytics(
        &self,
        short_code: &str,
        limit: usize,
    ) -> Result<Vec<AnalyticsEvent>, RepositoryError> {
        self.inner.get_analytics(short_code, limit).await
    }

    async fn count_analytics(&self, short_code: &str) -> Result<u64, RepositoryError> {
        self.inner.count_analytics(short_code).await
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub repo: Arc<InstrumentedRepository>,
    /// The underlying database, for tests that contend on its write lock
    pub db: Arc<Database>,
    _temp_db: NamedTempFile,
}

pub fn test_config() -> Config {
    Config {
        base_url: "http://localhost:8080".to_string(),
        ..Config::default()
    }
}

/// Creates an application backed by a temporary database
pub fn setup_test_app() -> TestApp {
    setup_test_app_with(test_config())
}

pub fn setup_test_app_with(config: Config) -> TestApp {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db = init_db(temp_db.path().to_str().unwrap()).expect("Failed to initialize test database");

    let db = Arc::new(db);
    let repo = Arc::new(InstrumentedRepository::new(RedbRepository::new(Arc::clone(&db))));
    let (state, _writer) = AppState::new(repo.clone(), &config);

    TestApp {
        app: create_app(state.clone()),
        state,
        repo,
        db,
        _temp_db: temp_db,
    }
}

/// Helper function to parse response body as JSON
pub async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

pub async fn post_shorten(app: &Router, payload: Value) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/shorten")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Creates a link and returns its short code
pub async fn create_link(app: &Router, url: &str, alias: Option<&str>) -> String {
    let payload = match alias {
        Some(alias) => json!({ "url": url, "custom_alias": alias }),
        None => json!({ "url": url }),
    };
    let response = post_shorten(app, payload).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response.into_body()).await;
    let short_url = body["short_url"].as_str().unwrap();
    short_url.rsplit('/').next().unwrap().to_string()
}

/// Polls the analytics endpoint until `total_clicks` reaches `expected`
pub async fn wait_for_clicks(app: &Router, short_code: &str, expected: u64) -> Value {
    let uri = format!("/api/analytics/{}", short_code);
    let mut last = Value::Null;

    for _ in 0..100 {
        let response = get(app, &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        last = response_json(response.into_body()).await;
        if last["total_clicks"] == expected {
            return last;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    panic!("expected {} clicks, last analytics body: {}", expected, last);
}

/// Holds the database write lock on another thread for `hold`
///
/// Returns once the lock is taken; join the handle to wait for its release.
pub fn hold_write_lock(db: &Arc<Database>, hold: Duration) -> std::thread::JoinHandle<()> {
    let (locked_tx, locked_rx) = std::sync::mpsc::channel();
    let db = Arc::clone(db);
    let holder = std::thread::spawn(move || {
        let txn = db.begin_write().expect("Failed to begin write");
        locked_tx.send(()).expect("Failed to signal lock");
        std::thread::sleep(hold);
        drop(txn);
    });
    locked_rx.recv().expect("Lock holder exited early");
    holder
}
