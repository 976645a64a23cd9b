//! Reconnect delays for the Redis trigger subscription.

use std::time::Duration;

use rand::Rng;

use crate::config::RedisConfig;

/// Share of each delay that may be shaved off at random
const JITTER: f64 = 0.2;

/// Doubling reconnect delay, capped and jittered downwards.
///
/// The n-th delay is `initial * 2^(n-1)` clamped to `max`, minus up to 20%.
/// Jitter never pushes a delay above the cap.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        Self {
            initial,
            max: max.max(initial),
            attempt: 0,
        }
    }

    pub fn from_config(config: &RedisConfig) -> Self {
        Self::new(
            Duration::from_millis(config.reconnect_initial_ms),
            Duration::from_millis(config.reconnect_max_ms),
        )
    }

    /// Delay before the next reconnect, before jitter
    pub fn base_delay(&self) -> Duration {
        let shift = self.attempt.saturating_sub(1).min(31);
        self.initial
            .saturating_mul(1u32 << shift)
            .min(self.max)
    }

    /// Advance to the next attempt and return its jittered delay
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        let base = self.base_delay();
        let shave = rand::rng().random_range(0.0..JITTER);
        base.mul_f64(1.0 - shave).max(Duration::from_millis(1))
    }

    /// Back to the first delay once a subscription is established
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Consecutive failed attempts since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> ReconnectBackoff {
        ReconnectBackoff::new(Duration::from_millis(100), Duration::from_millis(1000))
    }

    #[test]
    fn test_doubles_until_cap() {
        let mut backoff = backoff();
        let mut bases = Vec::new();
        for _ in 0..6 {
            backoff.next_delay();
            bases.push(backoff.base_delay().as_millis());
        }
        assert_eq!(bases, vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn test_jitter_stays_below_base() {
        let mut backoff = backoff();
        for _ in 0..50 {
            let delay = backoff.next_delay();
            let base = backoff.base_delay();
            assert!(delay <= base);
            assert!(delay >= base.mul_f64(1.0 - JITTER));
        }
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = backoff();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        backoff.next_delay();
        assert_eq!(backoff.base_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_bounds_from_config() {
        let config = RedisConfig {
            reconnect_initial_ms: 250,
            reconnect_max_ms: 100,
            ..Default::default()
        };
        let mut backoff = ReconnectBackoff::from_config(&config);
        backoff.next_delay();
        // A cap below the initial delay is raised to it
        assert_eq!(backoff.base_delay(), Duration::from_millis(250));
        backoff.next_delay();
        assert_eq!(backoff.base_delay(), Duration::from_millis(250));
    }
}
