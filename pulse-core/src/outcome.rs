//! Response classification and retry policy.
//!
//! Pure decisions about what to do with one HTTP attempt. The delivery
//! client in `pulse-client` performs the I/O and interprets the result.

use std::time::Duration;

/// Default number of extra attempts after a server error.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Default wait before retrying a server error.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// What to do with a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 200: delivered.
    Delivered,
    /// 422: the body carries field-level validation errors. Not retried.
    Rejected,
    /// 5xx: eligible for retry.
    Retryable(u16),
    /// Anything else. Not retried.
    Failed(u16),
}

impl Disposition {
    /// Classify a response status code.
    ///
    /// Only 200 counts as success; other 2xx codes are failures.
    pub fn classify(status: u16) -> Self {
        match status {
            200 => Self::Delivered,
            422 => Self::Rejected,
            500..=599 => Self::Retryable(status),
            other => Self::Failed(other),
        }
    }

    /// Check if this is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Bounded retry policy for server errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Fixed wait between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Decide whether attempt number `attempt` (0-based) should be followed
    /// by another one.
    ///
    /// Returns the delay to wait first, or `None` to surface the result.
    pub fn next_delay(&self, attempt: u32, disposition: Disposition) -> Option<Duration> {
        match disposition {
            Disposition::Retryable(_) if attempt < self.max_retries => Some(self.delay),
            _ => None,
        }
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_200_is_success() {
        assert_eq!(Disposition::classify(200), Disposition::Delivered);
        assert_eq!(Disposition::classify(201), Disposition::Failed(201));
        assert_eq!(Disposition::classify(204), Disposition::Failed(204));
        assert!(Disposition::classify(200).is_success());
    }

    #[test]
    fn validation_status_is_rejected() {
        assert_eq!(Disposition::classify(422), Disposition::Rejected);
    }

    #[test]
    fn server_errors_are_retryable() {
        for status in [500, 502, 503, 599] {
            assert_eq!(Disposition::classify(status), Disposition::Retryable(status));
        }
    }

    #[test]
    fn client_errors_fail() {
        for status in [400, 401, 404, 429] {
            assert_eq!(Disposition::classify(status), Disposition::Failed(status));
        }
        assert_eq!(Disposition::classify(600), Disposition::Failed(600));
    }

    #[test]
    fn default_policy_retries_once() {
        let policy = RetryPolicy::default();
        let server_error = Disposition::Retryable(503);

        assert_eq!(policy.next_delay(0, server_error), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(1, server_error), None);
        assert_eq!(policy.max_attempts(), 2);
    }

    #[test]
    fn non_retryable_outcomes_never_wait() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.next_delay(0, Disposition::Delivered), None);
        assert_eq!(policy.next_delay(0, Disposition::Rejected), None);
        assert_eq!(policy.next_delay(0, Disposition::Failed(404)), None);
    }

    #[test]
    fn none_policy_single_attempt() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.next_delay(0, Disposition::Retryable(500)), None);
        assert_eq!(policy.max_attempts(), 1);
    }
}
