//! Check command - validate configuration and show what would run

use super::CheckArgs;
use crate::config::ConfigSummary;
use anyhow::{bail, Result};
use std::path::Path;

pub async fn run_check(config_dir: &Path, args: &CheckArgs) -> Result<()> {
    let config = super::load(config_dir, args.config.as_deref())?;
    let summary = config.summary()?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        "text" => print_text(&summary),
        other => bail!("Unknown output format: {} (expected text or json)", other),
    }
    Ok(())
}

fn print_text(summary: &ConfigSummary) {
    println!("Configuration OK");
    println!();
    println!("Tor:");
    println!("  Executable:   {}", summary.tor_executable);
    println!("  torrc:        {}", summary.torrc);
    println!("  Control port: {} (auth: {})", summary.control_endpoint, summary.control_auth);
    println!();
    println!("Proxy:");
    println!("  Executable:   {}", summary.proxy_executable);
    println!("  Listening:    {}", summary.proxy_endpoint);
    println!("  System proxy: {}", summary.system_proxy);
    println!();
    println!("Rotation:");
    println!(
        "  Every {} ({}s), {}",
        summary.interval,
        summary.interval_secs,
        if summary.rotation_enabled { "enabled" } else { "disabled" }
    );
    println!("  Probe:        {}", summary.probe_url);
}
