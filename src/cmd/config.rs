//! `mfgtrack config`: show or validate the effective configuration.

use anyhow::Result;

use super::super::ConfigCommands;
use mfgtrack::config::TrackerConfig;

pub fn cmd_config(config: &TrackerConfig, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            print!("{}", config.to_toml()?);
        }
        Some(ConfigCommands::Validate) => {
            config.validate()?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
