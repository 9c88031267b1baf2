/// How the action loop reacts to timed-out remote calls.
///
/// Only timeouts are retried. There is no backoff: each attempt gets a fresh
/// timeout window right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per action, `None` for no limit.
    pub max_attempts: Option<u32>,
    /// Consecutive timeouts that are still logged.
    pub log_limit: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RetryPolicy {
    /// Retry timeouts forever.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            log_limit: 3,
        }
    }

    /// Give up after `attempts` timed-out attempts.
    pub fn bounded(attempts: u32) -> Self {
        Self {
            max_attempts: Some(attempts.max(1)),
            ..Self::unbounded()
        }
    }

    /// Whether another attempt follows the `timeouts`-th consecutive timeout.
    pub fn should_retry(&self, timeouts: u32) -> bool {
        self.max_attempts.map_or(true, |max| timeouts < max)
    }

    /// Whether the `timeouts`-th consecutive timeout is logged.
    pub fn should_log(&self, timeouts: u32) -> bool {
        timeouts <= self.log_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_gives_up() {
        let policy = RetryPolicy::unbounded();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(u32::MAX));
    }

    #[test]
    fn test_bounded_gives_up() {
        let policy = RetryPolicy::bounded(3);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_bounded_zero_means_one_attempt() {
        let policy = RetryPolicy::bounded(0);
        assert!(!policy.should_retry(1));
    }

    #[test]
    fn test_logging_stops_after_three() {
        let policy = RetryPolicy::default();
        assert!(policy.should_log(1));
        assert!(policy.should_log(3));
        assert!(!policy.should_log(4));
        assert!(!policy.should_log(100));
    }
}
