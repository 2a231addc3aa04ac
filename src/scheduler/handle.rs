//! Control surface for front ends

use super::events::{EventBus, Phase, RotationEvent};
use super::timer::InterruptibleTimer;
use crate::error::ValidationError;
use crate::state::IntervalSpec;
use crate::supervisor::ProcessSupervisor;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// State shared by the loop and every handle
pub(super) struct Shared {
    pub supervisor: Arc<ProcessSupervisor>,
    pub timer: InterruptibleTimer,
    pub rotate_requested: AtomicBool,
    pub events: EventBus,
    pub phase: watch::Sender<Phase>,
    pub shutdown: CancellationToken,
}

impl Shared {
    pub fn new(supervisor: Arc<ProcessSupervisor>, shutdown: CancellationToken) -> Self {
        let (phase, _) = watch::channel(Phase::Disabled);
        Self {
            supervisor,
            timer: InterruptibleTimer::new(shutdown.clone()),
            rotate_requested: AtomicBool::new(false),
            events: EventBus::new(),
            phase,
            shutdown,
        }
    }

    /// Record the phase; repeated `Disabled` ticks are not republished
    pub fn set_phase(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase.clone());
        if previous == Phase::Disabled && phase == Phase::Disabled {
            return;
        }
        self.events.publish(RotationEvent::PhaseChanged(phase));
    }
}

/// Point-in-time view for status displays
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub enabled: bool,
    pub phase: String,
    pub interval_secs: f64,
    pub rotations: u64,
    pub last_address: Option<String>,
    pub since_last_rotation_secs: Option<u64>,
    pub tor_running: bool,
    pub proxy_running: bool,
}

/// Cheap, cloneable handle to a running rotation loop
#[derive(Clone)]
pub struct RotatorHandle {
    shared: Arc<Shared>,
}

impl RotatorHandle {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Turn rotation on or off; takes effect on the next loop iteration
    pub async fn set_enabled(&self, enabled: bool) {
        let previous = self.shared.supervisor.set_enabled(enabled).await;
        if previous != enabled {
            info!("Rotation {}", if enabled { "enabled" } else { "disabled" });
            self.shared
                .events
                .publish(RotationEvent::EnabledChanged(enabled));
            self.shared.timer.interrupt();
        }
    }

    /// Apply a validated interval; the current wait is recomputed
    pub async fn set_interval(&self, interval: IntervalSpec) {
        self.shared.supervisor.set_interval(interval).await;
        info!("Rotation interval set to {}", interval);
        self.shared.events.publish(RotationEvent::IntervalChanged {
            seconds: interval.seconds(),
        });
        self.shared.timer.interrupt();
    }

    /// Parse and apply an interval given as text; nothing changes on error
    pub async fn set_interval_from(
        &self,
        value: f64,
        unit: &str,
    ) -> Result<IntervalSpec, ValidationError> {
        let interval = IntervalSpec::parse(value, unit)?;
        self.set_interval(interval).await;
        Ok(interval)
    }

    /// Rotate as soon as the loop sees it
    pub fn rotate_now(&self) {
        self.shared.rotate_requested.store(true, Ordering::SeqCst);
        self.shared.timer.interrupt();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RotationEvent> {
        self.shared.events.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.shared.phase.borrow().clone()
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        let supervisor = &self.shared.supervisor;
        let state = supervisor.settings().await;
        StatusSnapshot {
            enabled: state.enabled,
            phase: self.phase().to_string(),
            interval_secs: state.interval_secs,
            rotations: state.rotations,
            since_last_rotation_secs: state.since_last_rotation(),
            last_address: state.last_address,
            tor_running: supervisor.is_primary_running().await,
            proxy_running: supervisor.is_secondary_running().await,
        }
    }

    /// Ask the loop to stop; safe to call repeatedly
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Resolves once shutdown has been requested
    pub async fn cancelled(&self) {
        self.shared.shutdown.cancelled().await;
    }
}
