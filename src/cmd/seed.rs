//! `mfgtrack seed-failures <file>`: load the failure taxonomy.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use mfgtrack::config::TrackerConfig;
use mfgtrack::tracking::models::FailureTaxonomy;
use mfgtrack::tracking::repository::SqliteFailureRepository;
use mfgtrack::tracking::server;
use mfgtrack::tracking::service::FailureCatalog;

pub async fn cmd_seed_failures(config: &TrackerConfig, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read taxonomy file {}", file.display()))?;
    let taxonomy: FailureTaxonomy =
        toml::from_str(&raw).with_context(|| format!("Invalid taxonomy file {}", file.display()))?;
    let (groups, failures) = (taxonomy.groups.len(), taxonomy.failures.len());

    let db = server::open_database(config)?;
    let catalog = FailureCatalog::new(Arc::new(SqliteFailureRepository::new(db)));
    catalog.seed(taxonomy).await?;

    println!(
        "Seeded {} failure groups and {} failures into {}",
        groups, failures, config.database.url
    );
    Ok(())
}
