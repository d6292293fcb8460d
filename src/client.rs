use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::header;
use tokio::time::sleep;

use crate::{
    backoff::BackoffPolicy,
    classify::{classify, parse_retry_after, AttemptOutcome, Classification},
    decode::decode_json,
    logger::{Logger, NoopLogger},
    Account, CancellationToken, ClientOptions, InventoryOptions, InventoryResponse, ManapoolError,
    NetworkError, RateLimiter, RequestDescriptor, Result, ValidationError,
};

/// Header carrying the seller's API access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-ManaPool-Access-Token";
/// Header carrying the seller's account email.
pub const EMAIL_HEADER: &str = "X-ManaPool-Email";
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
/// HTTP client for the Manapool seller API.
///
/// Clones share the connection pool, the rate limiter and the logger, so a
/// single client (or its clones) can be used from many tasks at once while
/// respecting one request budget.
pub struct ManapoolClient {
    http: reqwest::Client,
    token: String,
    email: String,
    options: ClientOptions,
    backoff: BackoffPolicy,
    limiter: Arc<RateLimiter>,
    logger: Arc<dyn Logger>,
}

impl fmt::Debug for ManapoolClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManapoolClient")
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .field("options", &self.options)
            .field("limiter", &self.limiter)
            .finish()
    }
}

impl ManapoolClient {
    /// Creates a client with default options.
    pub fn new(token: impl Into<String>, email: impl Into<String>) -> Self {
        let options = ClientOptions::default();
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            email: email.into(),
            backoff: options.backoff_policy(),
            limiter: Arc::new(RateLimiter::default()),
            logger: Arc::new(NoopLogger),
            options,
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `MANAPOOL_TOKEN` — API access token
    /// - `MANAPOOL_EMAIL` — seller account email
    /// - `MANAPOOL_BASE_URL` — optional API root override
    ///
    /// # Example
    ///
    /// ```no_run
    /// use manapool_http::ManapoolClient;
    ///
    /// let client = ManapoolClient::from_env().expect("missing MANAPOOL_* env vars");
    /// ```
    pub fn from_env() -> Result<Self> {
        let token = required_env("MANAPOOL_TOKEN")?;
        let email = required_env("MANAPOOL_EMAIL")?;
        let client = Self::new(token, email);
        match std::env::var("MANAPOOL_BASE_URL") {
            Ok(base_url) if !base_url.trim().is_empty() => {
                client.with_options(ClientOptions::default().base_url(base_url))
            }
            _ => Ok(client),
        }
    }

    /// Applies endpoint, timeout, rate-limit and retry options.
    ///
    /// Replaces the rate limiter, so call this before cloning the client.
    pub fn with_options(mut self, opts: ClientOptions) -> Result<Self> {
        opts.validate()?;
        self.limiter = Arc::new(opts.rate_limiter()?);
        self.backoff = opts.backoff_policy();
        self.options = opts;
        Ok(self)
    }

    /// Replaces the underlying `reqwest` client (proxies, TLS, pooling).
    ///
    /// The per-attempt timeout from [`ClientOptions::timeout`] still applies.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Installs a diagnostics sink.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Overrides the identity sent in the email header.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Fetches the authenticated seller's account.
    pub async fn seller_account(&self, cancel: &CancellationToken) -> Result<Account> {
        let body = self
            .execute(&RequestDescriptor::get("account"), cancel)
            .await?;
        decode_json(&body)
    }

    /// Fetches one page of the seller's inventory.
    ///
    /// `opts` is validated before any request is made.
    pub async fn seller_inventory(
        &self,
        mut opts: InventoryOptions,
        cancel: &CancellationToken,
    ) -> Result<InventoryResponse> {
        opts.validate()?;
        let request = RequestDescriptor::get("seller/inventory")
            .query("limit", opts.limit)
            .query("offset", opts.offset);
        let body = self.execute(&request, cancel).await?;
        decode_json(&body)
    }

    /// Runs one logical call and returns the raw body of the 2xx response.
    ///
    /// Every attempt first takes a rate-limit permit. Transport failures, 429
    /// and 5xx are retried with exponential backoff until the retry budget
    /// is spent; any other failure is returned at once. Cancellation is
    /// observed while waiting for a permit, during the transport call and
    /// during backoff, and ends the call with a [`NetworkError`].
    pub async fn execute(
        &self,
        request: &RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let started = Instant::now();
        let max_attempts = self.backoff.max_attempts();
        let mut attempt = 0usize;
        let mut backoff_total = Duration::ZERO;

        loop {
            attempt += 1;

            if self.limiter.acquire(cancel).await.is_err() {
                return Err(self.cancelled(request, "waiting for rate limiter"));
            }

            self.logger.debug(format_args!(
                "manapool request attempt {attempt}/{max_attempts}: {} {}",
                request.method(),
                request.path()
            ));

            let outcome = match cancel.run_until_cancelled(self.send_once(request)).await {
                Some(outcome) => outcome,
                None => return Err(self.cancelled(request, "in flight")),
            };

            let (error, retryable, retry_after) = match classify(outcome) {
                Classification::Success(body) => return Ok(body),
                Classification::Failure {
                    error,
                    retryable,
                    retry_after,
                } => (error, retryable, retry_after),
            };

            self.logger.error(format_args!(
                "manapool request {} {} failed on attempt {attempt}: {error}",
                request.method(),
                request.path()
            ));

            if !retryable || !self.backoff.should_retry(attempt) {
                if retryable {
                    self.logger.debug(format_args!(
                        "manapool request {} {} giving up after {attempt} attempts in {:?}",
                        request.method(),
                        request.path(),
                        started.elapsed()
                    ));
                }
                return Err(error);
            }

            let delay = self.backoff.delay_with_hint(attempt, retry_after);
            self.wait_before_retry(request, attempt, delay, cancel).await?;
            backoff_total += delay;

            self.logger.debug(format_args!(
                "manapool request {} {} retrying after {:?} total backoff",
                request.method(),
                request.path(),
                backoff_total
            ));
        }
    }

    async fn send_once(&self, request: &RequestDescriptor) -> AttemptOutcome {
        let mut builder = self
            .http
            .request(request.method().clone(), request.url(&self.options.base_url))
            .header(ACCESS_TOKEN_HEADER, &self.token)
            .header(EMAIL_HEADER, &self.email)
            .header(header::USER_AGENT, &self.options.user_agent)
            .header(header::ACCEPT, "application/json")
            .timeout(self.options.timeout);

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(body) = request.body() {
            builder = builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => return AttemptOutcome::TransportFailure(err),
        };

        let status = response.status();
        let request_id = header_string(response.headers(), REQUEST_ID_HEADER);
        let retry_after = header_string(response.headers(), header::RETRY_AFTER.as_str())
            .as_deref()
            .and_then(parse_retry_after);

        let body = match response.bytes().await {
            Ok(body) => body.to_vec(),
            Err(err) => return AttemptOutcome::TransportFailure(err),
        };

        if status.is_success() {
            AttemptOutcome::Success {
                status: status.as_u16(),
                body,
            }
        } else {
            AttemptOutcome::HttpFailure {
                status: status.as_u16(),
                body,
                request_id,
                retry_after,
            }
        }
    }

    /// Sleeps `delay` before retry `attempt`, or fails once `cancel` fires.
    async fn wait_before_retry(
        &self,
        request: &RequestDescriptor,
        attempt: usize,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "retrying {} {} after {} ms",
            request.method(),
            request.path(),
            delay.as_millis()
        );

        self.logger.debug(format_args!(
            "manapool request {} {} backing off {:?} before retry {attempt}",
            request.method(),
            request.path(),
            delay
        ));

        match cancel.run_until_cancelled(sleep(delay)).await {
            Some(()) => Ok(()),
            None => Err(self.cancelled(request, "during retry backoff")),
        }
    }

    fn cancelled(&self, request: &RequestDescriptor, stage: &str) -> ManapoolError {
        let err = NetworkError::cancelled(format!(
            "{} {} cancelled {stage}",
            request.method(),
            request.path()
        ));
        self.logger.error(format_args!("manapool request {err}"));
        err.into()
    }
}

fn header_string(headers: &header::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) => Err(ValidationError::new(name, format!("{name} is set but empty")).into()),
        Err(_) => Err(
            ValidationError::new(name, format!("missing {name} environment variable")).into(),
        ),
    }
}
