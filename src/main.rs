//! rustrotate - scheduled Tor identity rotation
//!
//! Supervises a Tor daemon and a local proxy, points the OS proxy at the
//! local proxy, and asks Tor for a new identity on a fixed interval.
//!
//! # Usage
//!
//! ```bash
//! # Validate configuration
//! rustrotate check
//!
//! # Run with the interactive console
//! rustrotate run
//!
//! # One-off helpers
//! rustrotate ip
//! rustrotate newnym
//! ```

use anyhow::Result;
use clap::Parser;
use rustrotate::cli::{self, Cli, Commands};
use rustrotate::logging;
use std::process::ExitCode;
use std::time::Duration;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(dispatch(&cli));

    // A pending console read on stdin cannot be cancelled
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}

async fn dispatch(cli: &Cli) -> Result<ExitCode> {
    match &cli.command {
        Commands::Run(args) => return cli::run_daemon(&cli.config_dir, args).await,
        Commands::Ip(args) => {
            cli::run_ip(&cli.config_dir, args).await?;
        },
        Commands::Newnym(args) => {
            cli::run_newnym(&cli.config_dir, args).await?;
        },
        Commands::Check(args) => {
            cli::run_check(&cli.config_dir, args).await?;
        },
    }

    Ok(ExitCode::SUCCESS)
}
