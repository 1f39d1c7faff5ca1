use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::api::{self, AppState};
use super::db::{DatabaseTarget, DbHandle, TrackingDb};
use crate::config::TrackerConfig;

/// Build the full application router with request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the configured store and bootstrap its schema. Failure here is fatal
/// for the process.
pub fn open_database(config: &TrackerConfig) -> Result<DbHandle> {
    let target = DatabaseTarget::parse(&config.database.url).context("Invalid database URL")?;
    let db = TrackingDb::open(&target)
        .and_then(|db| db.with_statement_timeout(config.database.statement_timeout()))
        .with_context(|| format!("Unable to connect to database {}", config.database.url))?;
    info!(db = ?target, "database ready");
    Ok(DbHandle::new(db))
}

/// Start the tracking server and block until shutdown.
pub async fn start_server(config: TrackerConfig) -> Result<()> {
    let db = open_database(&config)?;
    let state = Arc::new(AppState::from_db(db));

    let mut app = build_router(state);

    if config.server.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(%local_addr, "mfgtrack listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
