//! Runtime rotation state

use crate::state::interval::IntervalSpec;
use std::time::{Duration, SystemTime};

/// Fallback interval when none is configured
pub const DEFAULT_INTERVAL_SECS: f64 = 3600.0;

/// Shared rotation settings
///
/// Owned by the process supervisor; daemon handles live next to it in the
/// supervisor's per-daemon slots.
#[derive(Debug, Clone)]
pub struct RotationState {
    /// Whether automatic rotation is active
    pub enabled: bool,
    /// Current interval, always > 0
    pub interval_secs: f64,
    /// When the last rotation cycle finished
    pub last_rotation: Option<SystemTime>,
    /// Address reported by the last successful probe
    pub last_address: Option<String>,
    /// Completed rotation cycles since start
    pub rotations: u64,
}

impl RotationState {
    /// Create initial state
    pub fn new(enabled: bool, interval: IntervalSpec) -> Self {
        Self {
            enabled,
            interval_secs: interval.seconds(),
            last_rotation: None,
            last_address: None,
            rotations: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    /// Record a finished rotation cycle
    pub fn record_rotation(&mut self, address: Option<String>) {
        self.last_rotation = Some(SystemTime::now());
        self.rotations += 1;
        if address.is_some() {
            self.last_address = address;
        }
    }

    /// Seconds since the last rotation
    pub fn since_last_rotation(&self) -> Option<u64> {
        self.last_rotation
            .and_then(|t| t.elapsed().ok().map(|d| d.as_secs()))
    }
}

impl Default for RotationState {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_INTERVAL_SECS,
            last_rotation: None,
            last_address: None,
            rotations: 0,
        }
    }
}
