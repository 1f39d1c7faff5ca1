use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use mfgtrack::config::{ConfigOverrides, TrackerConfig};

mod cmd;

#[derive(Parser)]
#[command(name = "mfgtrack")]
#[command(version, about = "Manufacturing tracking backend")]
pub struct Cli {
    /// Path to a TOML config file (defaults to .mfgtrack/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store connection string, e.g. sqlite://.mfgtrack/tracking.db or sqlite::memory:
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Port to serve on
        #[arg(short, long, env = "MFGTRACK_PORT")]
        port: Option<u16>,

        /// Interface to bind (overrides the 0.0.0.0 that --dev selects)
        #[arg(long)]
        host: Option<String>,

        /// Bootstrap the database schema and exit
        #[arg(long)]
        init: bool,

        /// Enable dev mode (CORS permissive, bind on 0.0.0.0 unless --host is given)
        #[arg(long)]
        dev: bool,
    },
    /// Load the failure taxonomy from a TOML file
    SeedFailures {
        /// TOML file with [[groups]] and [[failures]] tables
        file: PathBuf,
    },
    /// View the resolved configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration as TOML
    Show,
    /// Validate configuration and exit
    Validate,
}

fn resolve_config(cli: &Cli) -> Result<TrackerConfig> {
    let (port, host, dev) = match &cli.command {
        Commands::Serve { port, host, dev, .. } => (*port, host.clone(), *dev),
        _ => (None, None, false),
    };
    TrackerConfig::load(cli.config.as_deref())?.apply(ConfigOverrides {
        host,
        port,
        database_url: cli.database_url.clone(),
        dev_mode: dev,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let _log_guard = mfgtrack::logging::init(&config.logging)?;

    match &cli.command {
        Commands::Serve { init, .. } => cmd::cmd_serve(config, *init).await?,
        Commands::SeedFailures { file } => cmd::cmd_seed_failures(&config, file).await?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
