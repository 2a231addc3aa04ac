//! A single supervised external process

use crate::error::ProcessError;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

/// Hide the console window of spawned daemons on Windows
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// How to launch a daemon
#[derive(Debug, Clone)]
pub struct DaemonSpec {
    /// Name used in logs and errors
    pub name: String,
    pub executable: PathBuf,
    pub args: Vec<String>,
    /// Config file that must exist before launch
    pub config_path: Option<PathBuf>,
}

/// How a stop request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No live process to stop
    NotRunning,
    /// Exited within the grace period
    Graceful,
    /// Killed after the grace period elapsed
    Forced,
}

/// Process handle plus the recipe to (re)create it
pub struct ManagedDaemon {
    spec: DaemonSpec,
    child: Option<Child>,
    stop_timeout: Duration,
}

impl ManagedDaemon {
    pub fn new(spec: DaemonSpec, stop_timeout: Duration) -> Self {
        Self {
            spec,
            child: None,
            stop_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// OS process id of the live child
    pub fn pid(&mut self) -> Option<u32> {
        if self.is_running() {
            self.child.as_ref().and_then(Child::id)
        } else {
            None
        }
    }

    /// Poll the child; reaps and forgets it if it has exited
    pub fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!("{} exited on its own with {}", self.spec.name, status);
                self.child = None;
                false
            },
            Err(e) => {
                error!("Failed to poll {}: {}", self.spec.name, e);
                false
            },
        }
    }

    /// Launch unless already running
    ///
    /// Returns `true` when a new process was spawned.
    pub fn start(&mut self) -> Result<bool, ProcessError> {
        if self.is_running() {
            debug!("{} already running", self.spec.name);
            return Ok(false);
        }

        self.check_paths()?;

        let mut cmd = Command::new(&self.spec.executable);
        cmd.args(&self.spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let child = cmd.spawn().map_err(|source| {
            let daemon = self.spec.name.clone();
            let path = self.spec.executable.clone();
            match source.kind() {
                ErrorKind::NotFound => ProcessError::NotFound { daemon, path },
                ErrorKind::PermissionDenied => ProcessError::PermissionDenied {
                    daemon,
                    path,
                    source,
                },
                _ => ProcessError::LaunchFailed {
                    daemon,
                    path,
                    source,
                },
            }
        })?;

        info!(
            "{} started (pid {})",
            self.spec.name,
            child.id().map_or_else(|| "?".to_string(), |p| p.to_string())
        );
        self.child = Some(child);
        Ok(true)
    }

    fn check_paths(&self) -> Result<(), ProcessError> {
        if !self.spec.executable.exists() {
            error!("{} executable not found: {:?}", self.spec.name, self.spec.executable);
            return Err(ProcessError::NotFound {
                daemon: self.spec.name.clone(),
                path: self.spec.executable.clone(),
            });
        }
        if let Some(config) = &self.spec.config_path {
            if !config.exists() {
                error!("{} config not found: {:?}", self.spec.name, config);
                return Err(ProcessError::NotFound {
                    daemon: self.spec.name.clone(),
                    path: config.clone(),
                });
            }
        }
        Ok(())
    }

    /// Terminate gracefully, force-kill after the timeout
    ///
    /// The handle is cleared whatever the outcome.
    pub async fn stop(&mut self) -> Result<StopOutcome, ProcessError> {
        let Some(mut child) = self.child.take() else {
            return Ok(StopOutcome::NotRunning);
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("{} already exited with {}", self.spec.name, status);
                return Ok(StopOutcome::NotRunning);
            },
            Ok(None) => {},
            Err(e) => warn!("Failed to poll {} before stop: {}", self.spec.name, e),
        }

        request_termination(&mut child, &self.spec.name);

        let waited = tokio::time::timeout(self.stop_timeout, child.wait()).await;
        match waited {
            Ok(Ok(status)) => {
                info!("{} stopped ({})", self.spec.name, status);
                Ok(StopOutcome::Graceful)
            },
            Ok(Err(e)) => {
                warn!("Failed waiting for {}: {}; killing", self.spec.name, e);
                self.force_kill(child).await
            },
            Err(_) => {
                warn!(
                    "{} did not exit within {:?}; killing",
                    self.spec.name, self.stop_timeout
                );
                self.force_kill(child).await
            },
        }
    }

    async fn force_kill(&self, mut child: Child) -> Result<StopOutcome, ProcessError> {
        match child.kill().await {
            Ok(()) => {
                warn!("{} force-killed", self.spec.name);
                Ok(StopOutcome::Forced)
            },
            Err(source) => {
                error!("Failed to kill {}: {}", self.spec.name, source);
                Err(ProcessError::KillFailed {
                    daemon: self.spec.name.clone(),
                    source,
                })
            },
        }
    }
}

#[cfg(unix)]
fn request_termination(child: &mut Child, name: &str) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!("Failed to send SIGTERM to {} ({}): {}", name, pid, e);
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child, name: &str) {
    // No graceful signal on this platform; terminate outright
    if let Err(e) = child.start_kill() {
        warn!("Failed to terminate {}: {}", name, e);
    }
}
