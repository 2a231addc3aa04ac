//! Retry backoff

use std::time::Duration;

/// Delay after failed attempt `attempt` (1-based): `initial * 2^(attempt-1)`
///
/// The exponent is capped so large attempt counts cannot overflow.
pub fn exponential(initial: Duration, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    initial.saturating_mul(1_u32 << exp)
}
