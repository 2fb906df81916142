use std::time::Duration;

use chrono::Duration as ChronoDuration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt up to `max_delay`.
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound on a single provider call.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(15 * 60),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff to apply after `attempts` completed attempts: base * 2^(n-1),
    /// capped at `max_delay`.
    pub fn backoff(&self, attempts: u32) -> ChronoDuration {
        let exponent = attempts.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::seconds(60))
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(120),
            attempt_timeout: Duration::from_secs(5),
        };

        assert_eq!(policy.backoff(1).num_seconds(), 30);
        assert_eq!(policy.backoff(2).num_seconds(), 60);
        assert_eq!(policy.backoff(3).num_seconds(), 120);
        assert_eq!(policy.backoff(10).num_seconds(), 120);
    }

    #[test]
    fn exhaustion_at_max_attempts() {
        let policy = RetryPolicy::default();
        assert!(!policy.exhausted(4));
        assert!(policy.exhausted(5));
        assert!(policy.exhausted(6));
    }
}
