//! Runtime state and interval policy

pub mod interval;
pub mod model;

pub use interval::{IntervalSpec, TimeUnit};
pub use model::RotationState;
