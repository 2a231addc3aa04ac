//! Logging configuration
//!
//! Structured logging with tracing.

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Default filter for the given verbosity
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "rustrotate=debug"
    } else {
        "rustrotate=info"
    }
}

/// Initialize logging; `RUST_LOG` overrides the default filter
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    // A subscriber may already be installed (tests, embedding)
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
