//! # aaprof CLI
//!
//! Command-line front end over [`ProfileManager`]. Instances are described by JSON files
//! (see [`InstanceSpec`]); host settings come from an optional TOML config file.

use crate::apparmor::{HostCapabilities, ProfileManager};
use crate::config::Config;
use crate::instance::InstanceSpec;
use crate::utils::logging::init_logging;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aaprof: manage per-instance AppArmor profiles.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about,
    long_about = "aaprof generates, loads and removes per-instance AppArmor profiles.

Example: aaprof load instance.json
Example: aaprof --config /etc/aaprof.toml render instance.json
Example: aaprof detect"
)]
pub struct Cli {
    /// Path to a TOML host configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log to a file in the user cache directory instead of stderr
    #[arg(long, global = true)]
    pub log_to_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write the profile if it changed and load it into the kernel
    Load { instance: PathBuf },
    /// Unload the profile and its namespace from the kernel
    Unload { instance: PathBuf },
    /// Compile the on-disk profile without loading it
    Parse { instance: PathBuf },
    /// Remove the profile and its cache entry from disk
    Delete { instance: PathBuf },
    /// Print the rendered profile
    Render { instance: PathBuf },
    /// Print the profile and namespace names as JSON
    Names { instance: PathBuf },
    /// Print the detected host capabilities as JSON
    Detect,
}

pub fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path),
        None => Ok(Config::default()),
    }
}

/// Parse the command line and run the requested command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.debug { "debug" } else { "info" };
    init_logging(log_level, cli.log_to_file)?;

    let config = load_config(cli.config.as_ref())?;
    execute(&cli.command, ProfileManager::from_host(config))
}

pub fn execute(command: &Command, manager: ProfileManager) -> Result<()> {
    match command {
        Command::Load { instance } => {
            let instance = InstanceSpec::load_from_file(instance)?;
            manager
                .load(&instance)
                .with_context(|| format!("Failed to load profile for {}", instance.name))?;
        }
        Command::Unload { instance } => {
            let instance = InstanceSpec::load_from_file(instance)?;
            manager
                .unload(&instance)
                .with_context(|| format!("Failed to unload profile for {}", instance.name))?;
        }
        Command::Parse { instance } => {
            let instance = InstanceSpec::load_from_file(instance)?;
            manager
                .parse(&instance)
                .with_context(|| format!("Failed to parse profile for {}", instance.name))?;
        }
        Command::Delete { instance } => {
            let instance = InstanceSpec::load_from_file(instance)?;
            manager.delete(&instance);
        }
        Command::Render { instance } => {
            let instance = InstanceSpec::load_from_file(instance)?;
            print!("{}", manager.render(&instance)?);
        }
        Command::Names { instance } => {
            let instance = InstanceSpec::load_from_file(instance)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&manager.identity(&instance))?
            );
        }
        Command::Detect => {
            println!("{}", capabilities_json(manager.capabilities())?);
        }
    }
    Ok(())
}

fn capabilities_json(caps: &HostCapabilities) -> Result<String> {
    Ok(serde_json::to_string_pretty(caps)?)
}
