//! Retry budget and backoff schedule for failed deliveries.

use chrono::Duration;

/// How failed deliveries are retried.
///
/// A record gets `max_attempts` total delivery attempts. Between attempts
/// the delay doubles, starting at `base_delay` and capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total delivery attempts before a record is dead-lettered.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub base_delay: Duration,

    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::seconds(1),
            max_delay: Duration::minutes(5),
        }
    }
}

impl RetryPolicy {
    /// Returns true if a record that has now failed `attempts_made` times
    /// has exhausted its budget.
    pub fn is_exhausted(&self, attempts_made: u32) -> bool {
        attempts_made >= self.max_attempts
    }

    /// Returns the delay before the next attempt, given how many attempts
    /// have already been made.
    ///
    /// One attempt made yields `base_delay`, two yields twice that, and so
    /// on, saturating at `max_delay`.
    pub fn backoff(&self, attempts_made: u32) -> Duration {
        let exponent = attempts_made.saturating_sub(1).min(30);
        let delay = self
            .base_delay
            .checked_mul(1 << exponent)
            .unwrap_or(self.max_delay);
        delay.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::seconds(1));
        assert_eq!(policy.backoff(2), Duration::seconds(2));
        assert_eq!(policy.backoff(3), Duration::seconds(4));
        assert_eq!(policy.backoff(4), Duration::seconds(8));
    }

    #[test]
    fn backoff_saturates_at_max_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(20), Duration::minutes(5));
        assert_eq!(policy.backoff(100), Duration::minutes(5));
    }

    #[test]
    fn budget_exhaustion() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_exhausted(4));
        assert!(policy.is_exhausted(5));
        assert!(policy.is_exhausted(6));
    }
}
