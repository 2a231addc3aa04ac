//! Newnym command - request one new identity

use super::ConfigArgs;
use crate::tor::{ControlChannel, ControlConfig};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

pub async fn run_newnym(config_dir: &Path, args: &ConfigArgs) -> Result<()> {
    let config = super::load(config_dir, args.config.as_deref())?;
    let control = ControlConfig::from(&config.tor);
    let addr = control.addr();

    let version = request_newnym(&control)
        .await
        .with_context(|| format!("New identity request to {} failed", addr))?;

    match version {
        Some(v) => println!("New identity requested via {} (Tor {})", addr, v),
        None => println!("New identity requested via {}", addr),
    }
    Ok(())
}

/// Authenticate, read the Tor version, signal NEWNYM and quit
///
/// A failed version query is logged and does not stop the request.
async fn request_newnym(control: &ControlConfig) -> Result<Option<String>> {
    let mut channel = ControlChannel::connect(control).await?;

    let version = match channel.get_info("version").await {
        Ok(v) if !v.is_empty() => {
            info!("Connected to Tor {}", v);
            Some(v)
        },
        Ok(_) => None,
        Err(e) => {
            warn!("GETINFO version failed: {}", e);
            None
        },
    };

    channel.signal_newnym().await?;
    channel.quit().await?;
    Ok(version)
}
