//! Configuration validation
//!
//! Fail-fast validation of configuration invariants.

use super::Config;
use anyhow::{bail, Result};

/// Validate configuration invariants
pub fn validate(config: &Config) -> Result<()> {
    validate_tor(config)?;
    validate_proxy(config)?;
    validate_rotation(config)?;
    validate_probe(config)?;
    validate_supervisor(config)?;
    Ok(())
}

fn validate_tor(config: &Config) -> Result<()> {
    if config.tor.control_port == 0 {
        bail!("tor.control_port cannot be 0");
    }
    if config.tor.control_host.is_empty() {
        bail!("tor.control_host cannot be empty");
    }
    Ok(())
}

fn validate_proxy(config: &Config) -> Result<()> {
    if config.proxy.listen_port == 0 {
        bail!("proxy.listen_port cannot be 0");
    }
    if config.proxy.listen_host.is_empty() {
        bail!("proxy.listen_host cannot be empty");
    }
    Ok(())
}

fn validate_rotation(config: &Config) -> Result<()> {
    config.rotation.interval_spec()?;
    Ok(())
}

fn validate_probe(config: &Config) -> Result<()> {
    let probe = &config.probe;
    if probe.max_retries == 0 {
        bail!("probe.max_retries must be at least 1");
    }
    if !(probe.url.starts_with("http://") || probe.url.starts_with("https://")) {
        bail!("probe.url must be an http(s) URL: {}", probe.url);
    }
    if probe.timeout_secs == 0 {
        bail!("probe.timeout_secs cannot be 0");
    }
    match probe.proxy_scheme.as_str() {
        "http" | "socks5" | "socks5h" => {},
        other => bail!(
            "Unknown probe.proxy_scheme: {} (use 'http', 'socks5' or 'socks5h')",
            other
        ),
    }
    Ok(())
}

fn validate_supervisor(config: &Config) -> Result<()> {
    if config.supervisor.stop_timeout_secs == 0 {
        bail!("supervisor.stop_timeout_secs cannot be 0");
    }
    match config.supervisor.system_proxy.as_str() {
        "auto" | "gsettings" | "registry" | "none" => {},
        other => bail!(
            "Unknown supervisor.system_proxy: {} (use 'auto', 'gsettings', 'registry' or 'none')",
            other
        ),
    }
    Ok(())
}
