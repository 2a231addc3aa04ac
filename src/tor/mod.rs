//! Tor daemon interaction
//!
//! Control port communication and the per-cycle identity rotation built on
//! it. Tor itself is treated as a black box.

pub mod control;
pub mod rotate;

pub use control::{ControlChannel, ControlConfig};
pub use rotate::{ControlPortRotator, IdentityRotator};
