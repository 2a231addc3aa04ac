//! Notifications published by the rotation loop

use crate::probe::IdentityResult;
use crate::util::time::format_duration;
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::trace;

/// Buffered events per subscriber before the oldest are dropped
pub const EVENT_CAPACITY: usize = 64;

/// Where the loop is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Rotation off; daemons stopped
    Disabled,
    /// Sleeping until the next rotation
    Waiting { remaining: Duration },
    /// A cycle was just dispatched
    Rotating,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Waiting { remaining } => {
                write!(f, "next rotation in {}", format_duration(*remaining))
            },
            Self::Rotating => write!(f, "rotating"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RotationEvent {
    PhaseChanged(Phase),
    /// A cycle finished; the address may be unknown
    AddressUpdated(IdentityResult),
    /// The new-identity command failed
    RotationFailed { error: String },
    /// A daemon failed to start or stop
    DaemonError { daemon: String, error: String },
    EnabledChanged(bool),
    IntervalChanged { seconds: f64 },
}

/// Cloneable publisher
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RotationEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RotationEvent> {
        self.tx.subscribe()
    }

    /// Send to whoever listens; no listeners is fine
    pub fn publish(&self, event: RotationEvent) {
        if self.tx.send(event).is_err() {
            trace!("No event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
