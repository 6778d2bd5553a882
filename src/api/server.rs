//! Price Editor HTTP server
//!
//! Serves the editor page plus a small JSON API over the same sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::config::ServerConfig;
use crate::session::SessionStore;

/// Shared application state
pub struct AppState {
    pub version: String,
    pub config: ServerConfig,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let sessions = SessionStore::with_limits(
            Duration::from_secs(config.session_idle_secs),
            config.max_sessions,
        );
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config,
            sessions,
        }
    }
}

/// Build the router; separated from `run_server` so tests can drive it directly
pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.upload_limit_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Editor page
        .route("/", get(handlers::page))
        .route("/prices", post(handlers::submit_prices))
        .route("/upload", post(handlers::upload))
        .route("/export.csv", get(handlers::export_csv))
        // JSON API
        .route(
            "/api/v1/prices",
            get(handlers::get_prices).post(handlers::update_prices),
        )
        // Health and info endpoints
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        .with_state(state)
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the server until Ctrl+C / SIGTERM
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "price_editor=info,tower_http=info".into()),
        )
        .init();

    let addr: SocketAddr = config.address().parse()?;
    if !config.workbook.exists() {
        tracing::warn!(
            path = %config.workbook.display(),
            "default workbook not found; sessions will wait for an upload"
        );
    }

    let state = Arc::new(AppState::new(config));
    let app = build_router(Arc::clone(&state));

    info!("Price Editor starting on http://{}", addr);
    info!("   Workbook: {}", state.config.workbook.display());
    info!("   Uploads:  {}", state.config.upload_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.sessions.clear();
    info!("Price Editor shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}
