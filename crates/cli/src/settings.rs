//! `tgraph config`: validate and show threshold configuration.

use std::path::PathBuf;

use clap::Subcommand;

use taxgraph_recon::ReconConfig;

use crate::{print_json, CliError, Global};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Check a config file without running anything
    #[command(after_help = "\
Examples:
  tgraph config validate thresholds.toml")]
    Validate {
        /// Path to the TOML config file
        path: PathBuf,
    },

    /// Print the effective config (defaults merged with --config)
    Show,
}

pub fn cmd_config(global: &Global, cmd: ConfigCommands) -> Result<(), CliError> {
    match cmd {
        ConfigCommands::Validate { path } => {
            ReconConfig::from_path(&path)?;
            if global.json {
                print_json(&serde_json::json!({
                    "path": path.display().to_string(),
                    "valid": true,
                }))?;
            } else {
                eprintln!("{}: ok", path.display());
            }
            Ok(())
        }
        ConfigCommands::Show => {
            let config = global.load_config()?;
            if global.json {
                print_json(&config)
            } else {
                print!("{}", config.to_toml()?);
                Ok(())
            }
        }
    }
}
