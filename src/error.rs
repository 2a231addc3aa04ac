//! Error types for the rotation subsystem
//!
//! Application edges (CLI, config loading) use `anyhow`; the components
//! below return these typed errors so callers can tell failure kinds apart.

use std::path::PathBuf;
use thiserror::Error;

/// Rejected interval input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown interval unit: {0:?} (use seconds, minutes or hours)")]
    UnknownUnit(String),

    #[error("interval must be between {min} and {max} {unit}, got {value}")]
    OutOfRange {
        value: f64,
        min: f64,
        max: f64,
        unit: &'static str,
    },
}

/// Daemon lifecycle failures
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{daemon}: not found: {path}")]
    NotFound { daemon: String, path: PathBuf },

    #[error("{daemon}: permission denied launching {path}: {source}")]
    PermissionDenied {
        daemon: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{daemon}: failed to launch {path}: {source}")]
    LaunchFailed {
        daemon: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{daemon}: failed to kill process: {source}")]
    KillFailed {
        daemon: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    /// Name of the daemon the error belongs to
    pub fn daemon(&self) -> &str {
        match self {
            Self::NotFound { daemon, .. }
            | Self::PermissionDenied { daemon, .. }
            | Self::LaunchFailed { daemon, .. }
            | Self::KillFailed { daemon, .. } => daemon,
        }
    }
}

/// Tor control port failures
#[derive(Debug, Error)]
pub enum ControlChannelError {
    #[error("failed to connect to control port at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("control port I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for control port reply")]
    Timeout,

    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("command rejected with {code}: {message}")]
    Rejected { code: u16, message: String },

    #[error("control protocol error: {0}")]
    Protocol(String),
}

/// Address probe failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("proxy not accepting connections: {0}")]
    ProxyUnavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("malformed response: {0:?}")]
    Malformed(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl ProbeError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ProxyUnavailable(_) | Self::Timeout | Self::Network(_) => true,
            Self::HttpStatus(code) => *code == 429 || (500..600).contains(code),
            Self::Malformed(_) | Self::Client(_) => false,
        }
    }

    /// Fieldless kind, for results that outlive the error text
    pub fn kind(&self) -> ProbeErrorKind {
        match self {
            Self::ProxyUnavailable(_) => ProbeErrorKind::ProxyUnavailable,
            Self::Timeout => ProbeErrorKind::Timeout,
            Self::Network(_) => ProbeErrorKind::Network,
            Self::HttpStatus(_) => ProbeErrorKind::HttpStatus,
            Self::Malformed(_) => ProbeErrorKind::Malformed,
            Self::Client(_) => ProbeErrorKind::Client,
        }
    }
}

/// Kind of the last probe failure recorded in an `IdentityResult`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorKind {
    ProxyUnavailable,
    Timeout,
    Network,
    HttpStatus,
    Malformed,
    Client,
    /// The control channel failed, so no probe was attempted
    ControlChannel,
}
