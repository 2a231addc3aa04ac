//! Command-line interface for rustrotate
//!
//! Provides main commands:
//! - `run` - Supervise the daemons and rotate on schedule
//! - `ip` - Show the current external address
//! - `newnym` - Request one new identity
//! - `check` - Validate configuration

mod check;
pub mod console;
mod ip;
mod newnym;
mod run;

pub use check::run_check;
pub use ip::run_ip;
pub use newnym::run_newnym;
pub use run::run_daemon;

use crate::config::{self, Config};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// rustrotate - Scheduled Tor identity rotation
#[derive(Parser, Debug)]
#[command(name = "rustrotate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration directory
    #[arg(short, long, default_value = "/etc/rustrotate")]
    pub config_dir: PathBuf,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the daemons and rotate identities on schedule
    Run(RunArgs),

    /// Probe the current external address once
    Ip(IpArgs),

    /// Request a new identity once over the control port
    Newnym(ConfigArgs),

    /// Validate the configuration and print a summary
    Check(CheckArgs),
}

/// Arguments shared by commands that only need a config file
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Path to config file (overrides config_dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to config file (overrides config_dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Do not read commands from stdin
    #[arg(long, default_value_t = false)]
    pub no_console: bool,
}

/// Arguments for ip command
#[derive(Parser, Debug)]
pub struct IpArgs {
    /// Path to config file (overrides config_dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Skip the local proxy and query the endpoint directly
    #[arg(long, default_value_t = false)]
    pub direct: bool,
}

/// Arguments for check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Path to config file (overrides config_dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

/// Load config from `--config`, then `<config_dir>/config.toml`, then the
/// default locations
pub fn load(config_dir: &Path, explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return config::load_from_path(path);
    }

    let in_dir = config_dir.join("config.toml");
    if in_dir.exists() {
        return config::load_from_path(&in_dir);
    }

    config::load_config(None)
}
