//! Token bucket rate limiting for outbound API calls.

use std::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Token bucket for a single endpoint class.
///
/// Tokens are added at a constant rate and consumed when requests are made.
/// If no tokens are available, the request must wait.
pub struct TokenBucket {
    /// Max tokens the bucket holds (the allowed burst).
    capacity: f64,
    /// Current available tokens.
    tokens: f64,
    /// Tokens added per second.
    refill_rate: f64,
    /// Last refill time.
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket allowing `requests_per_minute` sustained requests.
    ///
    /// The burst size is a tenth of the rate, at least 1 and never above the
    /// rate itself. The bucket starts full.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let rate = requests_per_minute.max(1);
        let capacity = (rate / 10).clamp(1, rate) as f64;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: rate as f64 / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Try to acquire a token.
    ///
    /// Returns `Ok(())` on success, or `Err(wait)` with the duration until a
    /// token becomes available. Nothing is consumed on failure.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(needed / self.refill_rate))
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Shared async rate limiter over a [`TokenBucket`].
///
/// `acquire` only consumes a token once one is available, so a caller whose
/// future is dropped mid-wait (deadline, shutdown) has not spent anything.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::per_minute(requests_per_minute)),
        }
    }

    /// Wait until a token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().expect("rate limiter poisoned");
                match bucket.try_acquire() {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_bucket_burst_sizing() {
        let bucket = TokenBucket::per_minute(60);
        assert_eq!(bucket.capacity, 6.0);

        // Small rates still allow one request.
        let bucket = TokenBucket::per_minute(5);
        assert_eq!(bucket.capacity, 1.0);

        let bucket = TokenBucket::per_minute(25);
        assert_eq!(bucket.capacity, 2.0);
    }

    #[test]
    fn test_bucket_acquire_until_empty() {
        let mut bucket = TokenBucket::per_minute(60); // burst of 6

        for _ in 0..6 {
            assert!(bucket.try_acquire().is_ok());
        }
        assert!(bucket.try_acquire().is_err());
    }

    #[test]
    fn test_bucket_reports_wait_time() {
        let mut bucket = TokenBucket::per_minute(60); // 1 token/sec

        for _ in 0..6 {
            bucket.try_acquire().unwrap();
        }

        let wait = bucket.try_acquire().unwrap_err();
        assert!(wait <= Duration::from_secs(1));
        assert!(wait > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_refills_over_time() {
        let mut bucket = TokenBucket::per_minute(60); // 1 token/sec

        for _ in 0..6 {
            bucket.try_acquire().unwrap();
        }
        assert!(bucket.try_acquire().is_err());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiter_bounds_effective_rate() {
        let limiter = Arc::new(RateLimiter::per_minute(60));

        // Drain the burst plus a few refills; with auto-advanced time the
        // 10th acquire needs at least 4 seconds of refill.
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiter_dropped_wait_consumes_nothing() {
        let limiter = Arc::new(RateLimiter::per_minute(60));

        for _ in 0..6 {
            limiter.acquire().await;
        }

        // A caller that gives up mid-wait must not spend a token.
        let waiting = limiter.acquire();
        let timed_out = tokio::time::timeout(Duration::from_millis(100), waiting).await;
        assert!(timed_out.is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        let mut bucket = limiter.bucket.lock().unwrap();
        assert!(bucket.try_acquire().is_ok());
    }
}
