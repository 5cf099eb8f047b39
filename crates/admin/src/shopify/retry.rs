//! Batching and rate-limit retry settings.

use std::time::Duration;

/// How batched calls are sized, paced and retried on HTTP 429.
///
/// The wait before retry `n` (number of retries already made) is
/// `first_retry_delay` when `n == 0`, else `backoff_base * 2^n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// IDs per request.
    pub batch_size: usize,
    /// Pause between two consecutive batches.
    pub batch_pause: Duration,
    /// Retries after a 429 before the batch is given up.
    pub max_retries: u32,
    pub first_retry_delay: Duration,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_pause: Duration::from_millis(500),
            max_retries: 3,
            first_retry_delay: Duration::from_millis(500),
            backoff_base: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt, given how many retries were made.
    #[must_use]
    pub fn delay_for(&self, retries_made: u32) -> Duration {
        if retries_made == 0 {
            self.first_retry_delay
        } else {
            self.backoff_base
                .saturating_mul(2u32.saturating_pow(retries_made))
        }
    }

    /// Whether another retry is allowed after `retries_made` retries.
    #[must_use]
    pub const fn can_retry(&self, retries_made: u32) -> bool {
        retries_made < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[test]
    fn test_retry_budget() {
        let policy = RetryPolicy::default();
        assert!(policy.can_retry(0));
        assert!(policy.can_retry(2));
        assert!(!policy.can_retry(3));

        let no_retries = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert!(!no_retries.can_retry(0));
    }

    #[test]
    fn test_huge_retry_count_does_not_overflow() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_for(64) >= policy.delay_for(10));
    }
}
