//! OS-level proxy setting
//!
//! Points the desktop's proxy at the local proxy daemon while it runs.
//! Writes are best-effort: callers log failures and carry on. Each helper
//! command is awaited under [`COMMAND_TIMEOUT`] and killed when it overruns.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Windows per-user internet settings key
const REGISTRY_KEY: &str = r"HKCU\Software\Microsoft\Windows\CurrentVersion\Internet Settings";

/// Upper bound for one `gsettings` or `reg` invocation
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Persistent OS proxy toggle
#[async_trait]
pub trait SystemProxy: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Enable the OS proxy pointing at `endpoint` (`host:port`)
    async fn enable(&self, endpoint: &str) -> Result<()>;

    /// Disable the OS proxy
    async fn disable(&self) -> Result<()>;
}

/// Pick a backend by name ("auto", "gsettings", "registry", "none")
pub fn from_name(name: &str) -> Result<Box<dyn SystemProxy>> {
    match name {
        "auto" => Ok(detect()),
        "gsettings" => Ok(Box::new(GnomeProxy)),
        "registry" => Ok(Box::new(WindowsRegistryProxy)),
        "none" => Ok(Box::new(NoSystemProxy)),
        other => bail!("Unknown system proxy backend: {}", other),
    }
}

/// Best backend for this platform
pub fn detect() -> Box<dyn SystemProxy> {
    if cfg!(windows) {
        return Box::new(WindowsRegistryProxy);
    }

    if on_path("gsettings") {
        Box::new(GnomeProxy)
    } else {
        debug!("No supported system proxy backend found");
        Box::new(NoSystemProxy)
    }
}

fn on_path(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

/// Leaves the OS proxy alone
pub struct NoSystemProxy;

#[async_trait]
impl SystemProxy for NoSystemProxy {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn enable(&self, endpoint: &str) -> Result<()> {
        debug!("System proxy management disabled; not pointing at {}", endpoint);
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        Ok(())
    }
}

/// GNOME desktop proxy via gsettings
pub struct GnomeProxy;

impl GnomeProxy {
    async fn set(&self, schema: &str, key: &str, value: &str) -> Result<()> {
        run("gsettings", &["set", schema, key, value]).await
    }
}

#[async_trait]
impl SystemProxy for GnomeProxy {
    fn name(&self) -> &'static str {
        "gsettings"
    }

    async fn enable(&self, endpoint: &str) -> Result<()> {
        let (host, port) = split_endpoint(endpoint)?;
        for schema in ["org.gnome.system.proxy.http", "org.gnome.system.proxy.https"] {
            self.set(schema, "host", host).await?;
            self.set(schema, "port", port).await?;
        }
        self.set("org.gnome.system.proxy", "mode", "manual").await?;
        info!("System proxy enabled at {}", endpoint);
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        self.set("org.gnome.system.proxy", "mode", "none").await?;
        info!("System proxy disabled");
        Ok(())
    }
}

/// Windows internet settings via `reg add`
pub struct WindowsRegistryProxy;

#[async_trait]
impl SystemProxy for WindowsRegistryProxy {
    fn name(&self) -> &'static str {
        "registry"
    }

    async fn enable(&self, endpoint: &str) -> Result<()> {
        run(
            "reg",
            &["add", REGISTRY_KEY, "/v", "ProxyEnable", "/t", "REG_DWORD", "/d", "1", "/f"],
        )
        .await?;
        run(
            "reg",
            &["add", REGISTRY_KEY, "/v", "ProxyServer", "/t", "REG_SZ", "/d", endpoint, "/f"],
        )
        .await?;
        info!("System proxy enabled at {}", endpoint);
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        run(
            "reg",
            &["add", REGISTRY_KEY, "/v", "ProxyEnable", "/t", "REG_DWORD", "/d", "0", "/f"],
        )
        .await?;
        info!("System proxy disabled");
        Ok(())
    }
}

async fn run(program: &str, args: &[&str]) -> Result<()> {
    run_with_timeout(program, args, COMMAND_TIMEOUT).await
}

/// Run a helper command to completion; it is killed if `limit` passes first
pub(crate) async fn run_with_timeout(program: &str, args: &[&str], limit: Duration) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(limit, output)
        .await
        .with_context(|| format!("{} did not finish within {:?}", program, limit))?
        .with_context(|| format!("Failed to run {}", program))?;

    if !output.status.success() {
        bail!("{} {} failed with {}", program, args.join(" "), output.status);
    }
    Ok(())
}

fn split_endpoint(endpoint: &str) -> Result<(&str, &str)> {
    match endpoint.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok((host, port)),
        _ => bail!("Invalid proxy endpoint: {}", endpoint),
    }
}
