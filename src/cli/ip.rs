//! Ip command - probe the current external address once

use super::IpArgs;
use crate::probe::{HttpFetcher, IdentityProbe, RetryPolicy};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Print the address seen by the echo endpoint
pub async fn run_ip(config_dir: &Path, args: &IpArgs) -> Result<()> {
    let config = super::load(config_dir, args.config.as_deref())?;

    let fetcher = if args.direct {
        HttpFetcher::direct(&config.probe)
    } else {
        HttpFetcher::via_proxy(&config.probe, &config.proxy.endpoint())
    }
    .context("Failed to build probe HTTP client")?;

    let probe = IdentityProbe::new(Arc::new(fetcher), RetryPolicy::from(&config.probe));
    let result = probe.probe().await;

    match (&result.address, result.error) {
        (Some(address), _) => println!("{}", address),
        (None, Some(kind)) => println!(
            "{} ({:?} after {} attempt(s))",
            result.display_address(),
            kind,
            result.attempts
        ),
        (None, None) => println!("{}", result.display_address()),
    }
    Ok(())
}
