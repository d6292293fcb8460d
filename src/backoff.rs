use std::time::Duration;

/// How a `Retry-After` header on a 429 response affects the retry delay.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RetryAfter {
    /// Use the exponential schedule regardless of the header.
    #[default]
    Ignore,
    /// Wait at least as long as the server asked, still bounded by the
    /// policy's maximum delay.
    Honor,
}

/// Exponential retry schedule.
///
/// The delay before retry `n` (1-indexed) is `initial * 2^(n-1)`, saturating,
/// and clamped to `max_delay` when one is set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BackoffPolicy {
    /// Number of retries after the first attempt. `0` disables retrying.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub initial: Duration,
    /// Optional ceiling applied to every computed delay.
    pub max_delay: Option<Duration>,
    pub retry_after: RetryAfter,
}

impl BackoffPolicy {
    pub fn new(max_retries: usize, initial: Duration) -> Self {
        Self {
            max_retries,
            initial,
            max_delay: None,
            retry_after: RetryAfter::Ignore,
        }
    }

    /// Total attempts a logical call may make.
    pub fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt is allowed after `attempts_made` attempts.
    pub fn should_retry(&self, attempts_made: usize) -> bool {
        attempts_made <= self.max_retries
    }

    /// Delay before retry `retry` (1-indexed).
    pub fn delay(&self, retry: usize) -> Duration {
        let exp = retry.saturating_sub(1).min(31) as u32;
        let delay = self.initial.saturating_mul(1u32 << exp);
        self.clamp(delay)
    }

    /// Delay before retry `retry`, taking a server `Retry-After` hint into
    /// account according to [`RetryAfter`].
    pub fn delay_with_hint(&self, retry: usize, hint: Option<Duration>) -> Duration {
        let delay = self.delay(retry);
        match (self.retry_after, hint) {
            (RetryAfter::Honor, Some(hint)) => self.clamp(delay.max(hint)),
            _ => delay,
        }
    }

    fn clamp(&self, delay: Duration) -> Duration {
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}
