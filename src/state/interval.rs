//! Rotation interval validation
//!
//! Converts a user-supplied `(value, unit)` pair into seconds. Each unit has
//! its own inclusive range.

use crate::error::ValidationError;
use std::fmt;
use std::str::FromStr;

/// Unit of a rotation interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    /// Seconds per unit
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
        }
    }

    /// Inclusive `(min, max)` accepted for this unit
    pub const fn range(self) -> (f64, f64) {
        match self {
            Self::Seconds => (1.0, 86_400.0),
            Self::Minutes => (0.01, 1440.0),
            Self::Hours => (0.01, 24.0),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Ok(Self::Seconds),
            "m" | "min" | "mins" | "minute" | "minutes" => Ok(Self::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Ok(Self::Hours),
            _ => Err(ValidationError::UnknownUnit(s.to_string())),
        }
    }
}

/// Check `value` against the unit's range
pub fn validate(value: f64, unit: TimeUnit) -> Result<(), ValidationError> {
    let (min, max) = unit.range();
    // NaN fails both comparisons
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            value,
            min,
            max,
            unit: unit.as_str(),
        })
    }
}

/// Convert to seconds; does not validate
pub fn to_seconds(value: f64, unit: TimeUnit) -> f64 {
    value * unit.multiplier()
}

/// Validated interval as entered by the user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalSpec {
    value: f64,
    unit: TimeUnit,
}

impl IntervalSpec {
    pub fn new(value: f64, unit: TimeUnit) -> Result<Self, ValidationError> {
        validate(value, unit)?;
        Ok(Self { value, unit })
    }

    /// Parse a unit string, then validate
    ///
    /// An unrecognized unit is reported before the range is checked.
    pub fn parse(value: f64, unit: &str) -> Result<Self, ValidationError> {
        Self::new(value, unit.parse()?)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn seconds(&self) -> f64 {
        to_seconds(self.value, self.unit)
    }
}

impl fmt::Display for IntervalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}
