use std::time::Duration;

use super::types::WsReconnectStrategy;

/// Default number of reconnect attempts before a feed gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default base interval; attempt `n` waits `n * base`.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(1000);

/// Bounded, linearly increasing backoff.
///
/// Attempt `n` (1-based) is scheduled after `base * n`. Once `max_attempts` attempts have been
/// made without a successful open, `should_retry` turns false and the feed stays down.
#[derive(Clone, Debug)]
pub struct LinearBackoffReconnect {
    base: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl LinearBackoffReconnect {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for LinearBackoffReconnect {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

impl WsReconnectStrategy for LinearBackoffReconnect {
    fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        self.base.saturating_mul(self.attempts)
    }

    fn reset(&mut self) {
        self.attempts = 0;
    }

    fn should_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_linearly_with_attempt() {
        let mut strategy = LinearBackoffReconnect::new(Duration::from_millis(100), 5);
        let delays: Vec<_> = (0..5).map(|_| strategy.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300),
                Duration::from_millis(400),
                Duration::from_millis(500),
            ]
        );
    }

    #[test]
    fn attempt_counter_steps_by_one_and_resets() {
        let mut strategy = LinearBackoffReconnect::default();
        for expected in 1..=3 {
            strategy.next_delay();
            assert_eq!(strategy.attempts(), expected);
        }
        strategy.reset();
        assert_eq!(strategy.attempts(), 0);
        assert!(strategy.should_retry());
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut strategy = LinearBackoffReconnect::new(Duration::from_millis(1), 5);
        let mut scheduled = 0;
        while strategy.should_retry() {
            strategy.next_delay();
            scheduled += 1;
        }
        assert_eq!(scheduled, 5);
        assert!(!strategy.should_retry());
    }

    #[test]
    fn zero_max_attempts_never_retries() {
        let strategy = LinearBackoffReconnect::new(Duration::from_millis(1), 0);
        assert!(!strategy.should_retry());
    }
}
