//! External address probing
//!
//! Looks up the current public address through the local proxy, retrying
//! with exponential backoff while the proxy finishes starting up.

pub mod fetch;

pub use fetch::HttpFetcher;

use crate::config::ProbeConfig;
use crate::error::{ProbeError, ProbeErrorKind};
use crate::util::backoff;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shown in place of an address when none could be determined
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// One address lookup attempt
#[async_trait]
pub trait AddressFetcher: Send + Sync {
    async fn fetch(&self) -> Result<String, ProbeError>;
}

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResult {
    /// Address reported by the echo endpoint
    pub address: Option<String>,
    /// Attempts made (0 if none were)
    pub attempts: u32,
    /// Last error, if no address was obtained
    pub error: Option<ProbeErrorKind>,
}

impl IdentityResult {
    /// Result for a cycle that failed before probing
    pub fn not_probed(kind: ProbeErrorKind) -> Self {
        Self {
            address: None,
            attempts: 0,
            error: Some(kind),
        }
    }

    /// Address, or the "unknown" sentinel
    pub fn display_address(&self) -> &str {
        self.address.as_deref().unwrap_or(UNKNOWN_ADDRESS)
    }
}

/// Retry policy for the probe
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl From<&ProbeConfig> for RetryPolicy {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
        }
    }
}

/// Address lookup with bounded retries
pub struct IdentityProbe {
    fetcher: Arc<dyn AddressFetcher>,
    policy: RetryPolicy,
}

impl IdentityProbe {
    pub fn new(fetcher: Arc<dyn AddressFetcher>, policy: RetryPolicy) -> Self {
        Self { fetcher, policy }
    }

    /// Current address, or `UNKNOWN_ADDRESS` if every attempt failed
    pub async fn get_address(&self) -> String {
        self.probe().await.display_address().to_string()
    }

    /// Run the lookup and report how it went
    pub async fn probe(&self) -> IdentityResult {
        let max = self.policy.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=max {
            match self.fetcher.fetch().await {
                Ok(address) => {
                    info!("Current address: {} (attempt {}/{})", address, attempt, max);
                    return IdentityResult {
                        address: Some(address),
                        attempts: attempt,
                        error: None,
                    };
                },
                Err(e) if e.is_retryable() && attempt < max => {
                    let delay = backoff::exponential(self.policy.initial_delay, attempt);
                    debug!(
                        "Address probe attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, max, e, delay
                    );
                    last_error = Some(e.kind());
                    tokio::time::sleep(delay).await;
                },
                Err(e) => {
                    warn!("Address probe failed on attempt {}/{}: {}", attempt, max, e);
                    return IdentityResult {
                        address: None,
                        attempts: attempt,
                        error: Some(e.kind()),
                    };
                },
            }
        }

        // Only reached if the loop body never returned, which needs max == 0
        IdentityResult {
            address: None,
            attempts: max,
            error: last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays scripted results, then keeps failing
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<String, ProbeError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<String, ProbeError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AddressFetcher for ScriptedFetcher {
        async fn fetch(&self) -> Result<String, ProbeError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProbeError::ProxyUnavailable("refused".into())))
        }
    }

    fn refused() -> Result<String, ProbeError> {
        Err(ProbeError::ProxyUnavailable("connection refused".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success() {
        let fetcher = ScriptedFetcher::new(vec![
            refused(),
            Err(ProbeError::Timeout),
            Ok("203.0.113.9".to_string()),
        ]);
        let probe = IdentityProbe::new(fetcher.clone(), RetryPolicy::default());

        let start = Instant::now();
        let result = probe.probe().await;
        let elapsed = start.elapsed();

        assert_eq!(result.address.as_deref(), Some("203.0.113.9"));
        assert_eq!(result.attempts, 3);
        assert_eq!(fetcher.call_count(), 3);
        // 1s + 2s of backoff
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_millis(3100));

        let calls = fetcher.calls.lock().unwrap().clone();
        assert_eq!(calls[1] - calls[0], Duration::from_secs(1));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_returns_sentinel() {
        let fetcher = ScriptedFetcher::new(vec![]);
        let probe = IdentityProbe::new(fetcher.clone(), RetryPolicy::default());

        assert_eq!(probe.get_address().await, UNKNOWN_ADDRESS);
        assert_eq!(fetcher.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_aborts() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(ProbeError::Malformed("<html>".into())),
            Ok("203.0.113.9".to_string()),
        ]);
        let probe = IdentityProbe::new(fetcher.clone(), RetryPolicy::default());

        let result = probe.probe().await;
        assert_eq!(result.address, None);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.error, Some(ProbeErrorKind::Malformed));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_records_last_error() {
        let fetcher = ScriptedFetcher::new(vec![
            refused(),
            refused(),
            Err(ProbeError::HttpStatus(502)),
        ]);
        let probe = IdentityProbe::new(fetcher, RetryPolicy::default());

        let result = probe.probe().await;
        assert_eq!(result.display_address(), UNKNOWN_ADDRESS);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.error, Some(ProbeErrorKind::HttpStatus));
    }
}
