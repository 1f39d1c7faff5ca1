//! `mfgtrack serve`: run the HTTP API or bootstrap the schema.

use anyhow::Result;
use tracing::{error, info};

use mfgtrack::config::TrackerConfig;
use mfgtrack::tracking::server;

pub async fn cmd_serve(config: TrackerConfig, init: bool) -> Result<()> {
    if init {
        // Just bootstrap the schema
        let db = server::open_database(&config).inspect_err(|e| {
            error!(error = %format!("{:#}", e), "unable to open database");
        })?;
        drop(db);
        info!(url = %config.database.url, "database initialized");
        println!("Database initialized at {}", config.database.url);
        return Ok(());
    }

    server::start_server(config).await.inspect_err(|e| {
        error!(error = %format!("{:#}", e), "server stopped with error");
    })
}
