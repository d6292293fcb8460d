use std::time::Duration;

use crate::{
    backoff::{BackoffPolicy, RetryAfter},
    rate_limit::{DEFAULT_BURST, DEFAULT_REQUESTS_PER_SECOND},
    RateLimiter, ValidationError,
};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://manapool.com/api/v1/";

/// Configures endpoint, timeout, rate limiting and retry behavior.
///
/// Build with struct-update syntax over [`ClientOptions::default`] or with
/// the chainable setters, then hand it to
/// [`ManapoolClient::with_options`](crate::ManapoolClient::with_options).
#[derive(Clone, Debug, PartialEq)]
pub struct ClientOptions {
    /// API root that request paths are joined onto.
    pub base_url: String,
    /// Per-attempt timeout. Default: 30 s.
    pub timeout: Duration,
    /// Retries after the initial attempt. Default: 3.
    pub max_retries: usize,
    /// Delay before the first retry, doubled on each further retry.
    /// Default: 1 s.
    pub initial_backoff: Duration,
    /// Upper bound for any single retry delay. Default: none.
    pub max_backoff: Option<Duration>,
    /// 429 `Retry-After` handling. Default: [`RetryAfter::Ignore`].
    pub retry_after: RetryAfter,
    /// Sustained request rate. Default: 10/s.
    pub requests_per_second: f64,
    /// Token bucket capacity. Default: 1.
    pub burst: u32,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: None,
            retry_after: RetryAfter::Ignore,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst: DEFAULT_BURST,
            user_agent: format!("manapool-http/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientOptions {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry budget and the initial backoff.
    pub fn retry(mut self, max_retries: usize, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = Some(max_backoff);
        self
    }

    pub fn retry_after(mut self, retry_after: RetryAfter) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn rate_limit(mut self, requests_per_second: f64, burst: u32) -> Self {
        self.requests_per_second = requests_per_second;
        self.burst = burst;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::new("base_url", "base URL must not be empty"));
        }
        if self.timeout.is_zero() {
            return Err(ValidationError::new("timeout", "timeout must be positive"));
        }
        Ok(())
    }

    pub(crate) fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_retries: self.max_retries,
            initial: self.initial_backoff,
            max_delay: self.max_backoff,
            retry_after: self.retry_after,
        }
    }

    pub(crate) fn rate_limiter(&self) -> Result<RateLimiter, ValidationError> {
        RateLimiter::new(self.requests_per_second, self.burst)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ClientOptions, DEFAULT_BASE_URL};
    use crate::backoff::RetryAfter;

    #[test]
    fn defaults_match_documented_values() {
        let opts = ClientOptions::default();
        assert_eq!(opts.base_url, DEFAULT_BASE_URL);
        assert_eq!(opts.timeout, Duration::from_secs(30));
        assert_eq!(opts.max_retries, 3);
        assert_eq!(opts.initial_backoff, Duration::from_secs(1));
        assert_eq!(opts.max_backoff, None);
        assert_eq!(opts.retry_after, RetryAfter::Ignore);
        assert_eq!(opts.requests_per_second, 10.0);
        assert_eq!(opts.burst, 1);
        assert!(opts.user_agent.starts_with("manapool-http/"));
    }

    #[test]
    fn setters_compose() {
        let opts = ClientOptions::default()
            .base_url("http://localhost:9000/")
            .retry(0, Duration::ZERO)
            .rate_limit(5.0, 2)
            .max_backoff(Duration::from_secs(8))
            .user_agent("my-app/1.0");

        assert_eq!(opts.base_url, "http://localhost:9000/");
        assert_eq!(opts.max_retries, 0);
        assert_eq!(opts.requests_per_second, 5.0);
        assert_eq!(opts.burst, 2);
        assert_eq!(opts.backoff_policy().max_delay, Some(Duration::from_secs(8)));
        assert_eq!(opts.user_agent, "my-app/1.0");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let err = ClientOptions::default()
            .base_url("  ")
            .validate()
            .expect_err("empty base url");
        assert_eq!(err.field, "base_url");

        let err = ClientOptions::default()
            .timeout(Duration::ZERO)
            .validate()
            .expect_err("zero timeout");
        assert_eq!(err.field, "timeout");

        let err = ClientOptions::default()
            .rate_limit(0.0, 1)
            .rate_limiter()
            .expect_err("zero rate");
        assert_eq!(err.field, "requests_per_second");
    }
}
