// Retry / Backoff Policy
//
// Deliberately kind-agnostic: the policy exists to avoid hammering a
// proxy-fronted target during transient blocks, not to encode business
// logic. Pure function of retry_count so it stays auditable in isolation
// from the fetch logic.

use tracing::warn;

/// Retry decision for a failed attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given backoff delay.
    Retry { delay_secs: u64 },
    /// Ceiling reached: the task fails permanently.
    Fail,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    backoff_base: u32,
    backoff_max_secs: u64,
    default_max_retries: i32,
}

impl RetryPolicy {
    pub fn new(backoff_base: u32, backoff_max_secs: u64, default_max_retries: i32) -> Self {
        Self {
            backoff_base,
            backoff_max_secs,
            default_max_retries,
        }
    }

    pub fn default_max_retries(&self) -> i32 {
        self.default_max_retries
    }

    /// Backoff delay in seconds for the given post-increment retry_count:
    /// min(backoff_max, backoff_base ^ retry_count).
    pub fn delay_secs(&self, retry_count: i32) -> u64 {
        let exponent = retry_count.max(0) as u32;
        (self.backoff_base as u64)
            .checked_pow(exponent)
            .map_or(self.backoff_max_secs, |d| d.min(self.backoff_max_secs))
    }

    /// Decide for a failure that would bring the task to
    /// `post_increment_count` attempts against a ceiling of `max_retries`.
    pub fn decide(&self, post_increment_count: i32, max_retries: i32) -> RetryDecision {
        if post_increment_count > max_retries {
            warn!(
                retry_count = post_increment_count,
                max_retries, "Max retry attempts reached"
            );
            return RetryDecision::Fail;
        }
        RetryDecision::Retry {
            delay_secs: self.delay_secs(post_increment_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_with_cap() {
        let policy = RetryPolicy::new(2, 60, 3);
        assert_eq!(policy.delay_secs(1), 2);
        assert_eq!(policy.delay_secs(2), 4);
        assert_eq!(policy.delay_secs(3), 8);
        assert_eq!(policy.delay_secs(4), 16);
        assert_eq!(policy.delay_secs(5), 32);
        // 2^6 = 64 capped to 60
        assert_eq!(policy.delay_secs(6), 60);
        assert_eq!(policy.delay_secs(10), 60);
    }

    #[test]
    fn huge_counts_do_not_overflow() {
        let policy = RetryPolicy::new(2, 60, 3);
        assert_eq!(policy.delay_secs(64), 60);
    }

    #[test]
    fn decision_respects_ceiling() {
        let policy = RetryPolicy::new(2, 60, 3);
        assert_eq!(policy.decide(1, 3), RetryDecision::Retry { delay_secs: 2 });
        assert_eq!(policy.decide(3, 3), RetryDecision::Retry { delay_secs: 8 });
        assert_eq!(policy.decide(4, 3), RetryDecision::Fail);
    }
}
