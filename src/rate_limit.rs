//! Token-bucket rate limiter shared by every call of a client.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::{sleep, Instant};

use crate::{CancellationToken, ValidationError};

/// Default sustained request rate.
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 10.0;
/// Default bucket capacity.
pub const DEFAULT_BURST: u32 = 1;

/// Returned by [`RateLimiter::acquire`] when the wait was cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("rate limiter wait cancelled")]
pub struct AcquireCancelled;

/// Bounds outbound requests to `rate` per second with `burst` capacity.
///
/// Tokens refill continuously up to `burst`; the bucket starts full. A
/// waiting caller reserves its token up front, so the balance can go
/// negative and later callers queue behind earlier ones instead of racing
/// them. Cancelling the most recent reservation returns its token; an
/// earlier cancelled slot simply goes unused so queued deadlines stay valid.
pub struct RateLimiter {
    rate: f64,
    burst: u32,
    bucket: Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    updated: Instant,
    /// Sequence number handed to the next waiting reservation.
    next_seq: u64,
    /// Newest waiting reservation whose token may still be returned.
    tail: Option<u64>,
}

/// A token taken ahead of time; `seq` identifies it for cancellation.
struct Reservation {
    wait: Duration,
    seq: u64,
}

impl RateLimiter {
    /// Creates a limiter allowing `requests_per_second` with `burst` capacity.
    pub fn new(requests_per_second: f64, burst: u32) -> Result<Self, ValidationError> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(ValidationError::new(
                "requests_per_second",
                "rate must be a positive number",
            ));
        }
        if burst == 0 {
            return Err(ValidationError::new("burst", "burst must be at least 1"));
        }

        Ok(Self {
            rate: requests_per_second,
            burst,
            bucket: Mutex::new(Bucket::full(burst)),
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Waits for one permit.
    ///
    /// Returns [`AcquireCancelled`] as soon as `cancel` fires.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), AcquireCancelled> {
        if cancel.is_cancelled() {
            return Err(AcquireCancelled);
        }

        let reservation = self.reserve();
        if reservation.wait.is_zero() {
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        tracing::trace!("rate limiter waiting {:?} for a permit", reservation.wait);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.cancel_reservation(reservation.seq);
                Err(AcquireCancelled)
            }
            _ = sleep(reservation.wait) => Ok(()),
        }
    }

    /// Takes a permit only if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Consumes one token and returns how long the caller must wait for it.
    fn reserve(&self) -> Reservation {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens -= 1.0;
        let seq = bucket.next_seq;
        if bucket.tokens >= 0.0 {
            return Reservation {
                wait: Duration::ZERO,
                seq,
            };
        }

        bucket.next_seq += 1;
        bucket.tail = Some(seq);
        // Tiny rates can ask for more than `Duration` holds.
        let wait = Duration::try_from_secs_f64(-bucket.tokens / self.rate)
            .unwrap_or(Duration::MAX);
        Reservation { wait, seq }
    }

    /// Returns the token of a cancelled reservation if nobody queued behind
    /// it; otherwise later deadlines were computed against that token.
    fn cancel_reservation(&self, seq: u64) {
        let mut bucket = self.lock();
        if bucket.tail != Some(seq) {
            return;
        }
        bucket.tokens = (bucket.tokens + 1.0).min(f64::from(self.burst));
        bucket.tail = seq.checked_sub(1);
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.updated).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(f64::from(self.burst));
        bucket.updated = now;
    }

    // Bucket arithmetic cannot leave the state inconsistent, so a poisoned
    // lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Bucket {
    fn full(burst: u32) -> Self {
        Self {
            tokens: f64::from(burst),
            updated: Instant::now(),
            next_seq: 0,
            tail: None,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self {
            rate: DEFAULT_REQUESTS_PER_SECOND,
            burst: DEFAULT_BURST,
            bucket: Mutex::new(Bucket::full(DEFAULT_BURST)),
        }
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.rate)
            .field("burst", &self.burst)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::Instant;

    use super::{AcquireCancelled, RateLimiter};
    use crate::CancellationToken;

    #[test]
    fn rejects_invalid_configuration() {
        assert!(RateLimiter::new(0.0, 1).is_err());
        assert!(RateLimiter::new(-1.0, 1).is_err());
        assert!(RateLimiter::new(f64::NAN, 1).is_err());
        let err = RateLimiter::new(5.0, 0).expect_err("burst 0 must fail");
        assert_eq!(err.field, "burst");
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_available_immediately() {
        let limiter = RateLimiter::new(1.0, 3).expect("valid limiter");
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_for_refill() {
        let limiter = RateLimiter::new(10.0, 1).expect("valid limiter");
        let cancel = CancellationToken::new();
        let start = Instant::now();

        limiter.acquire(&cancel).await.expect("first permit");
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire(&cancel).await.expect("second permit");
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_are_spaced_by_rate() {
        let limiter = Arc::new(RateLimiter::new(10.0, 1).expect("valid limiter"));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let cancel = cancel.clone();
                tokio::spawn(async move { limiter.acquire(&cancel).await })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task").expect("permit");
        }

        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_never_exceed_burst() {
        let limiter = RateLimiter::new(100.0, 2).expect("valid limiter");
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn cancelled_token_fails_without_consuming() {
        let limiter = RateLimiter::new(1.0, 1).expect("valid limiter");
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(limiter.acquire(&cancel).await, Err(AcquireCancelled));
        assert!(limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_refunds_token() {
        let limiter = Arc::new(RateLimiter::new(1.0, 1).expect("valid limiter"));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.expect("first permit");

        let waiter = {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        assert_eq!(waiter.await.expect("task"), Err(AcquireCancelled));

        // The refunded reservation means a full token is back after one period.
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(limiter.try_acquire());
    }

    fn timed_acquire(
        limiter: &Arc<RateLimiter>,
        cancel: &CancellationToken,
        start: Instant,
    ) -> tokio::task::JoinHandle<Result<Duration, AcquireCancelled>> {
        let limiter = Arc::clone(limiter);
        let cancel = cancel.clone();
        tokio::spawn(async move { limiter.acquire(&cancel).await.map(|()| start.elapsed()) })
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_with_queue_behind_keeps_slots_apart() {
        let limiter = Arc::new(RateLimiter::new(10.0, 1).expect("valid limiter"));
        let shared = CancellationToken::new();
        let first_cancel = CancellationToken::new();
        let start = Instant::now();
        limiter.acquire(&shared).await.expect("first permit");

        let first = timed_acquire(&limiter, &first_cancel, start);
        let second = timed_acquire(&limiter, &shared, start);
        tokio::time::sleep(Duration::from_millis(10)).await;
        first_cancel.cancel();
        let late = timed_acquire(&limiter, &shared, start);

        assert_eq!(first.await.expect("task"), Err(AcquireCancelled));
        let second_at = second.await.expect("task").expect("permit");
        let late_at = late.await.expect("task").expect("permit");

        assert!(second_at >= Duration::from_millis(200));
        assert!(
            late_at >= second_at + Duration::from_millis(90),
            "permits granted at {second_at:?} and {late_at:?} with burst 1"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_last_waiter_hands_its_slot_to_next_caller() {
        let limiter = Arc::new(RateLimiter::new(10.0, 1).expect("valid limiter"));
        let shared = CancellationToken::new();
        let last_cancel = CancellationToken::new();
        let start = Instant::now();
        limiter.acquire(&shared).await.expect("first permit");

        let first = timed_acquire(&limiter, &shared, start);
        let last = timed_acquire(&limiter, &last_cancel, start);
        tokio::time::sleep(Duration::from_millis(10)).await;
        last_cancel.cancel();
        assert_eq!(last.await.expect("task"), Err(AcquireCancelled));
        let late = timed_acquire(&limiter, &shared, start);

        let first_at = first.await.expect("task").expect("permit");
        let late_at = late.await.expect("task").expect("permit");

        assert!(first_at >= Duration::from_millis(100));
        assert!(late_at >= first_at + Duration::from_millis(90));
        assert!(late_at <= Duration::from_millis(210));
    }

    #[test]
    fn tiny_rate_saturates_wait_instead_of_panicking() {
        let limiter = RateLimiter::new(1e-20, 1).expect("valid limiter");
        assert!(limiter.try_acquire());
        assert_eq!(limiter.reserve().wait, Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn tiny_rate_wait_is_still_cancellable() {
        let limiter = Arc::new(RateLimiter::new(1e-20, 1).expect("valid limiter"));
        let cancel = CancellationToken::new();
        assert!(limiter.try_acquire());

        let waiter = timed_acquire(&limiter, &cancel, Instant::now());
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        assert_eq!(waiter.await.expect("task"), Err(AcquireCancelled));
    }
}
