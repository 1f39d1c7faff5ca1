//! Layered configuration for the tracking server.
//!
//! Values resolve in this order, later layers winning:
//! built-in defaults → `.mfgtrack/config.toml` (or `--config`) → environment
//! (`DATABASE_URL`, `MFGTRACK_PORT`) → CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! dev_mode = false
//!
//! [database]
//! url = "sqlite://.mfgtrack/tracking.db"
//! statement_timeout_ms = 5000
//!
//! [logging]
//! filter = "info,mfgtrack=debug"
//! json = false
//! dir = ".mfgtrack/logs"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = ".mfgtrack/config.toml";

/// Host `--dev` binds to unless `--host` is given.
pub const DEV_HOST: &str = "0.0.0.0";

/// SQLite takes its busy timeout as an `i32` of milliseconds.
pub const MAX_STATEMENT_TIMEOUT_MS: u64 = i32::MAX as u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS
    #[serde(default)]
    pub dev_mode: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

impl DatabaseSection {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
    /// Also write daily-rotated log files here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite://.mfgtrack/tracking.db".to_string()
}

fn default_statement_timeout_ms() -> u64 {
    5000
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Overrides that arrive from the environment or the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub dev_mode: bool,
}

impl TrackerConfig {
    /// Load from an explicit file, or from the default location when it
    /// exists. A missing default file yields the built-in defaults; a
    /// missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if overrides.dev_mode {
            self.server.dev_mode = true;
            self.server.host = DEV_HOST.to_string();
        }
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            anyhow::bail!("database.url must not be empty");
        }
        if self.database.statement_timeout_ms == 0 {
            anyhow::bail!("database.statement_timeout_ms must be greater than zero");
        }
        if self.database.statement_timeout_ms > MAX_STATEMENT_TIMEOUT_MS {
            anyhow::bail!(
                "database.statement_timeout_ms must be at most {}, got {}",
                MAX_STATEMENT_TIMEOUT_MS,
                self.database.statement_timeout_ms
            );
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
