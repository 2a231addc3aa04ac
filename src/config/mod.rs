//! Configuration loading and validation
//!
//! Handles TOML configuration parsing with strict validation. The setup
//! step that discovers executables and writes these files is external;
//! paths here are taken as given and re-checked at daemon start.

pub mod file;
mod validation;

pub use file::{load_config, load_from_path};
pub use validation::validate;

use crate::error::ValidationError;
use crate::state::interval::IntervalSpec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides `tor.control_password`
pub const CONTROL_PASSWORD_ENV: &str = "ROTATE_CONTROL_PASSWORD";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub tor: TorConfig,
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

/// Tor daemon (primary) and its control port
#[derive(Debug, Clone, Deserialize)]
pub struct TorConfig {
    /// Path to the tor executable
    pub executable: PathBuf,
    /// torrc passed with `-f`
    pub torrc: PathBuf,
    #[serde(default = "default_control_host")]
    pub control_host: String,
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    /// Plaintext password matching the torrc's HashedControlPassword
    pub control_password: Option<String>,
}

fn default_control_host() -> String {
    "127.0.0.1".to_string()
}
fn default_control_port() -> u16 {
    9061
}

/// Local proxy daemon (secondary)
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Path to the proxy executable
    pub executable: PathBuf,
    /// Extra arguments passed at launch
    #[serde(default)]
    pub args: Vec<String>,
    /// Config file the proxy reads, checked for existence before launch
    pub config_path: Option<PathBuf>,
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    /// Port the proxy listens on; also written to the OS proxy setting
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_listen_host() -> String {
    "127.0.0.1".to_string()
}
fn default_listen_port() -> u16 {
    7890
}

impl ProxyConfig {
    /// `host:port` of the local proxy
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

/// Rotation schedule
#[derive(Debug, Clone, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Rotate once right after startup
    #[serde(default = "default_enabled")]
    pub rotate_on_start: bool,
}

fn default_enabled() -> bool {
    true
}
fn default_interval() -> f64 {
    1.0
}
fn default_unit() -> String {
    "hours".to_string()
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval: default_interval(),
            unit: default_unit(),
            rotate_on_start: default_enabled(),
        }
    }
}

impl RotationConfig {
    /// Interval as a validated spec
    pub fn interval_spec(&self) -> Result<IntervalSpec, ValidationError> {
        IntervalSpec::parse(self.interval, &self.unit)
    }
}

/// Address probe settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Echo endpoint returning the caller's address as plain text
    #[serde(default = "default_probe_url")]
    pub url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the second attempt; doubles after each failure
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
    /// "http" or "socks5h"
    #[serde(default = "default_proxy_scheme")]
    pub proxy_scheme: String,
}

fn default_probe_url() -> String {
    "https://api.ipify.org".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_probe_timeout() -> u64 {
    10
}
fn default_proxy_scheme() -> String {
    "http".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: default_probe_url(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            timeout_secs: default_probe_timeout(),
            proxy_scheme: default_proxy_scheme(),
        }
    }
}

/// Process supervision settings
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    /// Grace period between SIGTERM and a forced kill
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
    /// OS proxy backend: "auto", "gsettings", "registry" or "none"
    #[serde(default = "default_system_proxy")]
    pub system_proxy: String,
}

fn default_stop_timeout() -> u64 {
    5
}
fn default_system_proxy() -> String {
    "auto".to_string()
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: default_stop_timeout(),
            system_proxy: default_system_proxy(),
        }
    }
}

/// Short config summary for `check`
#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub tor_executable: String,
    pub torrc: String,
    pub control_endpoint: String,
    pub control_auth: &'static str,
    pub proxy_executable: String,
    pub proxy_endpoint: String,
    pub rotation_enabled: bool,
    pub interval: String,
    pub interval_secs: f64,
    pub probe_url: String,
    pub system_proxy: String,
}

impl Config {
    pub fn summary(&self) -> Result<ConfigSummary, ValidationError> {
        let spec = self.rotation.interval_spec()?;
        Ok(ConfigSummary {
            tor_executable: self.tor.executable.display().to_string(),
            torrc: self.tor.torrc.display().to_string(),
            control_endpoint: format!("{}:{}", self.tor.control_host, self.tor.control_port),
            control_auth: if self.tor.control_password.is_some() {
                "password"
            } else {
                "none"
            },
            proxy_executable: self.proxy.executable.display().to_string(),
            proxy_endpoint: self.proxy.endpoint(),
            rotation_enabled: self.rotation.enabled,
            interval: spec.to_string(),
            interval_secs: spec.seconds(),
            probe_url: self.probe.url.clone(),
            system_proxy: self.supervisor.system_proxy.clone(),
        })
    }
}
