//! Application entry point and server initialization
//!
//! Loads configuration, opens the database, starts the analytics writer and
//! serves HTTP until a shutdown signal arrives. Queued analytics are drained
//! before the process exits.

use std::process::ExitCode;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use shortlink::config::Config;
use shortlink::database::init_db;
use shortlink::repository::{RedbRepository, Repository};
use shortlink::route::{create_app, AppState};

/// Application entry point
///
/// Only startup failures end the process with a non-zero code: invalid
/// configuration, an unusable database file, or a port that cannot be bound.
#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shortlink=debug,tower_http=debug")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let db = match init_db(&config.database_path) {
        Ok(db) => db,
        Err(err) => {
            error!(error = %err, path = %config.database_path, "failed to initialize database");
            return ExitCode::FAILURE;
        }
    };

    let repo: Arc<dyn Repository> = Arc::new(RedbRepository::new(Arc::new(db)));
    let (state, analytics_writer) = AppState::new(repo, &config);

    let app = create_app(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, addr = %addr, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(
        addr = %addr,
        base_url = %config.base_url,
        database = %config.database_path,
        "server running"
    );

    // In-flight requests complete before serve returns; the router and its
    // analytics handles are dropped with it, which closes the queue
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %err, "server error");
    }

    match tokio::time::timeout(config.shutdown_drain_timeout, analytics_writer).await {
        Ok(Ok(())) => info!("analytics queue drained"),
        Ok(Err(err)) => error!(error = %err, "analytics writer panicked"),
        Err(_) => warn!(
            timeout = ?config.shutdown_drain_timeout,
            "analytics queue not drained before timeout, remaining events lost"
        ),
    }

    ExitCode::SUCCESS
}

/// Waits for SIGINT (Ctrl+C) or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
