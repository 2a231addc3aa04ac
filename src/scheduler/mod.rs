//! Rotation scheduling
//!
//! One long-lived task decides when to rotate; rotation cycles run in a
//! small worker pool. Front ends drive it through a [`RotatorHandle`].
//! All tokio::spawn calls for rotation live here.

mod cycle;
pub mod events;
mod handle;
mod loops;
mod pool;
mod timer;

pub use cycle::CycleContext;
pub use events::{Phase, RotationEvent};
pub use handle::{RotatorHandle, StatusSnapshot};
pub use loops::ControllerOptions;
pub use timer::{InterruptibleTimer, WaitOutcome};

use crate::config::Config;
use crate::error::ProcessError;
use crate::probe::{HttpFetcher, IdentityProbe, RetryPolicy};
use crate::supervisor::ProcessSupervisor;
use crate::tor::{ControlConfig, ControlPortRotator, IdentityRotator};
use anyhow::{Context, Result};
use handle::Shared;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A running rotation loop plus the supervisor it drives
pub struct Rotator {
    handle: RotatorHandle,
    task: JoinHandle<()>,
    supervisor: Arc<ProcessSupervisor>,
}

impl Rotator {
    /// Start the loop on the current runtime
    pub fn spawn(
        supervisor: Arc<ProcessSupervisor>,
        rotator: Arc<dyn IdentityRotator>,
        probe: Arc<IdentityProbe>,
        options: ControllerOptions,
    ) -> Self {
        let shared = Arc::new(Shared::new(
            Arc::clone(&supervisor),
            CancellationToken::new(),
        ));
        let ctx = Arc::new(CycleContext {
            supervisor: Arc::clone(&supervisor),
            rotator,
            probe,
            events: shared.events.clone(),
        });

        let task = tokio::spawn(loops::rotation_loop(Arc::clone(&shared), ctx, options));

        Self {
            handle: RotatorHandle::new(shared),
            task,
            supervisor,
        }
    }

    /// Wire up the real control port, HTTP probe and daemons
    pub fn from_config(config: &Config) -> Result<Self> {
        let supervisor = Arc::new(ProcessSupervisor::from_config(config)?);
        let rotator = Arc::new(ControlPortRotator::new(ControlConfig::from(&config.tor)));
        let fetcher = HttpFetcher::via_proxy(&config.probe, &config.proxy.endpoint())
            .context("Failed to build probe HTTP client")?;
        let probe = Arc::new(IdentityProbe::new(
            Arc::new(fetcher),
            RetryPolicy::from(&config.probe),
        ));

        info!(
            "Rotating every {} {} (enabled: {})",
            config.rotation.interval, config.rotation.unit, config.rotation.enabled
        );
        Ok(Self::spawn(
            supervisor,
            rotator,
            probe,
            ControllerOptions::from(config),
        ))
    }

    pub fn handle(&self) -> RotatorHandle {
        self.handle.clone()
    }

    /// Stop the loop, drain cycles, then stop both daemons
    pub async fn shutdown(self) -> Result<(), ProcessError> {
        self.handle.shutdown();
        if let Err(e) = self.task.await {
            error!("Rotation loop ended abnormally: {}", e);
        }
        self.supervisor.shutdown().await
    }
}
