//! rustrotate library crate
//!
//! Scheduled identity rotation for a local Tor daemon, with the local proxy
//! that routes traffic through it kept alive alongside.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and stdin console
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Typed errors for each component
//! - [`probe`] - External address lookup with retries
//! - [`scheduler`] - Rotation loop, worker pool and control handle
//! - [`state`] - Interval policy and rotation settings
//! - [`supervisor`] - Daemon lifecycles and the OS proxy toggle
//! - [`tor`] - Control port client and identity rotation
//! - [`util`] - Time formatting, backoff

#![allow(clippy::missing_const_for_fn)] // Const fn optimization is low priority
#![allow(clippy::doc_markdown)] // Doc formatting is secondary
#![allow(clippy::uninlined_format_args)] // Format string style preference
#![allow(clippy::cast_lossless)] // Explicit casts are fine
#![allow(clippy::cast_possible_wrap)] // pid_t conversion
#![allow(clippy::option_if_let_else)] // Style preference
#![allow(clippy::use_self)] // Explicit types are clearer
#![allow(clippy::significant_drop_tightening)] // Lock scope is intentional
#![allow(clippy::single_match_else)] // Match for clarity
#![allow(clippy::match_wildcard_for_single_variants)] // Wildcard for future
#![allow(clippy::redundant_closure_for_method_calls)] // Explicit closures
#![allow(clippy::map_unwrap_or)] // map().unwrap_or is clearer
#![allow(clippy::format_push_string)] // Clarity over allocation
#![allow(clippy::too_many_lines)] // Some functions are complex

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod probe;
pub mod scheduler;
pub mod state;
pub mod supervisor;
pub mod tor;
pub mod util;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
