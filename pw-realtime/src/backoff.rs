//! Reconnect delay policy.
//!
//! Pure backoff arithmetic: exponential growth from a base delay, a hard cap,
//! and a bounded random jitter so a fleet of clients does not retry in
//! lockstep. The policy holds no counters; the connection actor owns the
//! attempt count and resets it whenever a connection is established.

use std::time::Duration;

use rand::Rng;

use pw_core::config::RealtimeConfig;
use pw_core::constants;

/// Computes reconnect delays and decides when to give up.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    multiplier: f64,
    jitter: Duration,
    max_delay: Duration,
    max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(constants::DEFAULT_BASE_DELAY_MS),
            multiplier: constants::DEFAULT_BACKOFF_MULTIPLIER,
            jitter: Duration::from_millis(constants::DEFAULT_JITTER_MS),
            max_delay: Duration::from_millis(constants::DEFAULT_MAX_DELAY_MS),
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Build a policy from the realtime configuration section.
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.backoff_multiplier,
            jitter: Duration::from_millis(config.jitter_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts,
        }
    }

    /// Delay to wait before the given attempt (1-based):
    /// `min(max_delay, base_delay * multiplier^(attempt-1))` plus a uniform
    /// random jitter in `[0, jitter]`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.delay_before_jitter(attempt) + jitter
    }

    /// Whether the given attempt (1-based) is still within the configured
    /// budget. Returns false once `attempt` exceeds `max_attempts`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// Maximum number of consecutive attempts before the policy gives up.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The deterministic part of the delay, before jitter is added.
    fn delay_before_jitter(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let scaled = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_millis() as f64 {
            self.max_delay
        } else {
            Duration::from_millis(scaled as u64).min(self.max_delay)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(base_ms: u64, multiplier: f64, max_ms: u64) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(base_ms),
            multiplier,
            jitter: Duration::ZERO,
            max_delay: Duration::from_millis(max_ms),
            max_attempts: 10,
        }
    }

    #[test]
    fn test_delay_doubles_until_cap() {
        let policy = no_jitter(1_000, 2.0, 30_000);
        assert_eq!(policy.next_delay(1), Duration::from_secs(1));
        assert_eq!(policy.next_delay(2), Duration::from_secs(2));
        assert_eq!(policy.next_delay(3), Duration::from_secs(4));
        assert_eq!(policy.next_delay(5), Duration::from_secs(16));
        // 2^5 = 32s exceeds the 30s cap
        assert_eq!(policy.next_delay(6), Duration::from_secs(30));
        assert_eq!(policy.next_delay(100), Duration::from_secs(30));
    }

    #[test]
    fn test_multiplier_one_stays_flat() {
        let policy = no_jitter(500, 1.0, 30_000);
        assert_eq!(policy.next_delay(1), Duration::from_millis(500));
        assert_eq!(policy.next_delay(9), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = ReconnectPolicy::default();
        for attempt in 1..=12 {
            let floor = policy.delay_before_jitter(attempt);
            let ceiling = floor + Duration::from_millis(constants::DEFAULT_JITTER_MS);
            for _ in 0..50 {
                let delay = policy.next_delay(attempt);
                assert!(delay >= floor, "attempt {attempt}: {delay:?} below {floor:?}");
                assert!(delay <= ceiling, "attempt {attempt}: {delay:?} above {ceiling:?}");
            }
        }
    }

    #[test]
    fn test_deterministic_part_is_non_decreasing() {
        let policy = ReconnectPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..=20 {
            let delay = policy.delay_before_jitter(attempt);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_should_retry_cutoff() {
        let policy = ReconnectPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(10));
        assert!(!policy.should_retry(11));
    }

    #[test]
    fn test_from_config() {
        let config = RealtimeConfig::default()
            .with_base_delay_ms(100)
            .with_backoff_multiplier(3.0)
            .with_jitter_ms(0)
            .with_max_delay_ms(1_000)
            .with_max_attempts(2);
        let policy = ReconnectPolicy::from_config(&config);
        assert_eq!(policy.next_delay(1), Duration::from_millis(100));
        assert_eq!(policy.next_delay(2), Duration::from_millis(300));
        assert_eq!(policy.next_delay(3), Duration::from_millis(900));
        assert_eq!(policy.next_delay(4), Duration::from_millis(1_000));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            policy.delay_before_jitter(u32::MAX),
            Duration::from_millis(constants::DEFAULT_MAX_DELAY_MS)
        );
    }
}
