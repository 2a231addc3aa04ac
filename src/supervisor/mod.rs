//! Daemon supervision
//!
//! One `ProcessSupervisor` owns the Tor daemon (primary), the local proxy
//! daemon (secondary), the OS proxy toggle that follows the proxy's
//! lifetime, and the shared rotation settings.

pub mod daemon;
pub mod system_proxy;

pub use daemon::{DaemonSpec, ManagedDaemon, StopOutcome};
pub use system_proxy::SystemProxy;

use crate::config::Config;
use crate::error::ProcessError;
use crate::state::{IntervalSpec, RotationState};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Owner of both daemons and the rotation settings
pub struct ProcessSupervisor {
    state: RwLock<RotationState>,
    primary: Mutex<ManagedDaemon>,
    secondary: Mutex<ManagedDaemon>,
    system_proxy: Box<dyn SystemProxy>,
    /// `host:port` written to the OS proxy setting
    proxy_endpoint: String,
    shut_down: AtomicBool,
}

impl ProcessSupervisor {
    pub fn new(
        primary: DaemonSpec,
        secondary: DaemonSpec,
        proxy_endpoint: String,
        system_proxy: Box<dyn SystemProxy>,
        stop_timeout: Duration,
        state: RotationState,
    ) -> Self {
        Self {
            state: RwLock::new(state),
            primary: Mutex::new(ManagedDaemon::new(primary, stop_timeout)),
            secondary: Mutex::new(ManagedDaemon::new(secondary, stop_timeout)),
            system_proxy,
            proxy_endpoint,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Build from validated configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let interval = config.rotation.interval_spec()?;
        let tor = &config.tor;

        let primary = DaemonSpec {
            name: "tor".to_string(),
            executable: tor.executable.clone(),
            args: vec!["-f".to_string(), tor.torrc.display().to_string()],
            config_path: Some(tor.torrc.clone()),
        };
        let secondary = DaemonSpec {
            name: "proxy".to_string(),
            executable: config.proxy.executable.clone(),
            args: config.proxy.args.clone(),
            config_path: config.proxy.config_path.clone(),
        };

        let system_proxy = system_proxy::from_name(&config.supervisor.system_proxy)?;
        info!("System proxy backend: {}", system_proxy.name());

        Ok(Self::new(
            primary,
            secondary,
            config.proxy.endpoint(),
            system_proxy,
            Duration::from_secs(config.supervisor.stop_timeout_secs),
            RotationState::new(config.rotation.enabled, interval),
        ))
    }

    // --- shared settings ---

    /// Copy of the current rotation settings
    pub async fn settings(&self) -> RotationState {
        self.state.read().await.clone()
    }

    /// Returns the previous value
    pub async fn set_enabled(&self, enabled: bool) -> bool {
        let mut state = self.state.write().await;
        std::mem::replace(&mut state.enabled, enabled)
    }

    pub async fn set_interval(&self, interval: IntervalSpec) {
        let mut state = self.state.write().await;
        state.interval_secs = interval.seconds();
    }

    pub async fn record_rotation(&self, address: Option<String>) {
        self.state.write().await.record_rotation(address);
    }

    // --- primary (tor) ---

    /// Start Tor unless it is already running
    pub async fn start_primary(&self) -> Result<(), ProcessError> {
        if self.is_shut_down() {
            warn!("Ignoring start of tor after shutdown");
            return Ok(());
        }
        self.primary.lock().await.start().map(|_| ())
    }

    /// Stop Tor; the handle is cleared even when the kill fails
    pub async fn stop_primary(&self) -> Result<StopOutcome, ProcessError> {
        self.primary.lock().await.stop().await
    }

    pub async fn is_primary_running(&self) -> bool {
        self.primary.lock().await.is_running()
    }

    // --- secondary (local proxy) ---

    /// Start the proxy and point the OS proxy setting at it
    pub async fn start_secondary(&self) -> Result<(), ProcessError> {
        if self.is_shut_down() {
            warn!("Ignoring start of proxy after shutdown");
            return Ok(());
        }
        let mut secondary = self.secondary.lock().await;
        let launched = secondary.start()?;
        if launched {
            if let Err(e) = self.system_proxy.enable(&self.proxy_endpoint).await {
                warn!("Failed to enable system proxy: {:#}", e);
            }
        }
        Ok(())
    }

    /// Stop the proxy and always clear the OS proxy setting
    pub async fn stop_secondary(&self) -> Result<StopOutcome, ProcessError> {
        let mut secondary = self.secondary.lock().await;
        let result = secondary.stop().await;
        if let Err(e) = self.system_proxy.disable().await {
            warn!("Failed to disable system proxy: {:#}", e);
        }
        result
    }

    pub async fn is_secondary_running(&self) -> bool {
        self.secondary.lock().await.is_running()
    }

    // --- both ---

    /// Start both daemons; both are attempted, the first error is returned
    pub async fn start_all(&self) -> Result<(), ProcessError> {
        let primary = self.start_primary().await;
        let secondary = self.start_secondary().await;
        primary.and(secondary)
    }

    /// Stop both daemons; both are attempted, the first error is returned
    pub async fn stop_all(&self) -> Result<(), ProcessError> {
        let primary = self.stop_primary().await;
        let secondary = self.stop_secondary().await;
        primary.and(secondary).map(|_| ())
    }

    /// Restart any daemon that exited on its own
    ///
    /// Both daemons are attempted; the first error is returned.
    pub async fn ensure_running(&self) -> Result<(), ProcessError> {
        let primary = if self.is_primary_running().await {
            Ok(())
        } else {
            info!("tor is not running; starting it");
            self.start_primary().await
        };
        let secondary = if self.is_secondary_running().await {
            Ok(())
        } else {
            info!("proxy is not running; starting it");
            self.start_secondary().await
        };
        primary.and(secondary)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stop both daemons for good
    ///
    /// Only the first call does any work; later calls return `Ok(())`.
    pub async fn shutdown(&self) -> Result<(), ProcessError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Stopping supervised daemons");
        self.stop_all().await
    }
}
