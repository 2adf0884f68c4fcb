//! Capped exponential backoff between reconnect attempts.

use crate::config::RetryConfig;
use std::time::Duration;

/// Computes the delay before a given reconnect attempt.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub config: RetryConfig,
}

impl BackoffPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the delay before the `attempt`-th reconnect (1-based), or
    /// `None` once `attempt` exceeds `max_retries`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.config.max_retries {
            return None;
        }
        let base_ms = self.config.initial_backoff_ms as f64
            * self.config.multiplier.powi((attempt - 1) as i32);
        let capped = base_ms.min(self.config.max_backoff_ms as f64);
        Some(Duration::from_millis(capped as u64))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double() {
        let policy = BackoffPolicy::new(RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
        });
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_millis(400)));
        assert!(policy.next_delay(4).is_none());
    }

    #[test]
    fn delay_capped_at_max() {
        let policy = BackoffPolicy::new(RetryConfig {
            max_retries: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
            multiplier: 10.0,
        });
        let d5 = policy.next_delay(5).unwrap();
        assert_eq!(d5, Duration::from_millis(500), "d5={d5:?} not capped");
    }

    #[test]
    fn zero_budget_never_retries() {
        let policy = BackoffPolicy::new(RetryConfig {
            max_retries: 0,
            ..Default::default()
        });
        assert!(policy.next_delay(0).is_none());
        assert!(policy.next_delay(1).is_none());
    }
}
