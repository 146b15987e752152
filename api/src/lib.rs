//! Pulsebox API Server
//!
//! This crate provides the HTTP server for Pulsebox. Monitoring agents push
//! metric payloads to it, and the most recent records can be read back.
//!
//! # Architecture
//!
//! The API server is built on Axum and Tokio, providing:
//! - `POST /api/metrics` for agent payloads
//! - `GET /api/metrics/logs` for the 100 most recent records
//! - `GET /health` for load balancers
//!
//! Every handler reaches storage through the [`AppState`] it is given;
//! there is no global connection state.
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
mod logging;
mod routes;
mod state;

pub use config::{Config, ConfigError, LogFormat, DEFAULT_MAX_BODY_BYTES};
pub use logging::init_tracing;
pub use routes::{ErrorResponse, IngestResponse};
pub use state::AppState;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::Router;
use shared::storage::{MetricLogStore, SqliteMetricLogStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Runs the Pulsebox API server.
///
/// This function initializes the server with configuration from environment variables
/// and starts listening for incoming connections. It handles graceful shutdown on
/// SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The database cannot be opened or its schema created
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the Pulsebox API server with the provided configuration.
///
/// This is useful for testing or when you want to provide configuration programmatically.
///
/// # Errors
///
/// Returns an error if:
/// - The configured host and port do not form a socket address
/// - The database cannot be opened or its schema created
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        database = %config.database_url,
        categories = ?config.categories.iter().collect::<Vec<_>>(),
        "Pulsebox API server starting"
    );

    let store = SqliteMetricLogStore::open_shared(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    let shared_store: Arc<dyn MetricLogStore> = store.clone();
    let state = AppState::new(shared_store, config.categories.clone())
        .with_max_body_bytes(config.max_body_bytes);
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes();

    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::metrics_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
