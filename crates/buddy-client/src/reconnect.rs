//! Reconnection bookkeeping.
//!
//! Two separate concerns live here:
//!
//! - [`ReconnectPolicy`]: the controller's escalation rule. It mirrors the
//!   transport's attempt counter and decides when automatic recovery gives
//!   way to the manual-reconnect view.
//! - [`Backoff`]: the transport's own delay schedule between automatic
//!   reconnection attempts.

use std::time::Duration;

use rand::RngExt;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Failed automatic attempts tolerated before the controller gives up.
pub const DEFAULT_RECONNECT_THRESHOLD: u32 = 3;

/// Delay before the first automatic reconnection attempt, in ms.
pub const RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Upper bound on the delay between attempts, in ms.
pub const RECONNECT_MAX_DELAY_MS: u64 = 5_000;

// ---------------------------------------------------------------------------
// ReconnectPolicy
// ---------------------------------------------------------------------------

/// Tracks consecutive failed reconnection attempts against a fixed threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    attempt_count: u32,
    threshold: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_THRESHOLD)
    }
}

impl ReconnectPolicy {
    pub fn new(threshold: u32) -> Self {
        Self {
            attempt_count: 0,
            threshold,
        }
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Record the transport's attempt number.
    ///
    /// The count is monotone until the next [`reset`](Self::reset): a stale,
    /// lower attempt number never rolls it back.
    pub fn record_attempt(&mut self, attempt: u32) {
        self.attempt_count = self.attempt_count.max(attempt);
    }

    /// `true` once the threshold has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.attempt_count >= self.threshold
    }

    pub fn reset(&mut self) {
        self.attempt_count = 0;
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Exponential backoff with randomized jitter.
///
/// `delay(k) = min(base * factor^(k-1) ± jitter, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Backoff {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: u32,
    /// Randomization factor in `[0, 1)`.
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay_ms: RECONNECT_BASE_DELAY_MS,
            max_delay_ms: RECONNECT_MAX_DELAY_MS,
            factor: 2,
            jitter: 0.5,
        }
    }
}

impl Backoff {
    /// Delay before attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let raw = self
            .base_delay_ms
            .saturating_mul(u64::from(self.factor).saturating_pow(exponent));

        let mut ms = raw as f64;
        if self.jitter > 0.0 {
            let mut rng = rand::rng();
            let roll: f64 = rng.random();
            let deviation = (roll * self.jitter * ms).floor();
            let shorten: bool = rng.random();
            ms = if shorten { ms - deviation } else { ms + deviation };
        }

        let capped = ms.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_at_threshold() {
        let mut policy = ReconnectPolicy::default();
        assert_eq!(policy.threshold(), 3);
        policy.record_attempt(1);
        policy.record_attempt(2);
        assert!(!policy.is_exhausted());
        policy.record_attempt(3);
        assert!(policy.is_exhausted());
        assert_eq!(policy.attempt_count(), 3);
    }

    #[test]
    fn stale_attempts_do_not_roll_back() {
        let mut policy = ReconnectPolicy::new(3);
        policy.record_attempt(2);
        policy.record_attempt(1);
        assert_eq!(policy.attempt_count(), 2);
        policy.reset();
        assert_eq!(policy.attempt_count(), 0);
    }

    #[test]
    fn backoff_without_jitter_is_exponential_and_capped() {
        let backoff = Backoff {
            jitter: 0.0,
            ..Backoff::default()
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(1_000));
        assert_eq!(backoff.delay(2), Duration::from_millis(2_000));
        assert_eq!(backoff.delay(3), Duration::from_millis(4_000));
        assert_eq!(backoff.delay(4), Duration::from_millis(5_000));
        assert_eq!(backoff.delay(60), Duration::from_millis(5_000));
    }

    #[test]
    fn jittered_delay_stays_in_bounds() {
        let backoff = Backoff::default();
        for attempt in 1..=6 {
            let raw = 1_000u64 * 2u64.pow(attempt - 1);
            let low = raw / 2;
            let high = (raw + raw / 2).min(5_000);
            for _ in 0..50 {
                let ms = backoff.delay(attempt).as_millis() as u64;
                assert!(ms >= low.min(5_000) && ms <= high, "attempt {attempt}: {ms}");
            }
        }
    }
}
