//! Token bucket rate limiter
//!
//! Bounds the outbound request rate of everything above it. Tokens refill
//! as a function of elapsed monotonic time only, so wall-clock adjustments
//! never distort the rate. The bucket never holds more than the configured
//! burst capacity.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Shared token state, guarded by a mutex that is never held across a
/// suspension point
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter for controlling request frequency
///
/// `acquire` (async) and `acquire_blocking` (for sequential, non-runtime
/// callers) serialize through the same mutex, so concurrent call sites of
/// either flavor see a consistent token count. Waiters sleep for the exact
/// time until the next token rather than spinning; wake order is FIFO-ish
/// and every waiter eventually acquires.
pub struct RateLimiter {
    requests_per_second: f64,
    burst_size: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// Creates a limiter with a full bucket
    ///
    /// # Arguments
    ///
    /// * `requests_per_second` - Steady-state refill rate (must be > 0)
    /// * `burst_size` - Bucket capacity (must be >= 1)
    pub fn new(requests_per_second: f64, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size: f64::from(burst_size),
            state: Mutex::new(BucketState {
                tokens: f64::from(burst_size),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Refills the bucket from elapsed monotonic time, capped at burst
    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = self
            .burst_size
            .min(state.tokens + elapsed * self.requests_per_second);
        state.last_refill = now;
    }

    /// Attempts to take one token; on failure returns how long to wait
    /// before the next token is due
    fn try_acquire(&self) -> Option<Duration> {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            None
        } else {
            let wait = (1.0 - state.tokens) / self.requests_per_second;
            Some(Duration::from_secs_f64(wait))
        }
    }

    /// Waits until a token is available, then consumes it
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                None => return,
                Some(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    /// Blocking variant of [`acquire`](Self::acquire) for sequential flows
    /// outside an async runtime
    ///
    /// Must not be called from an async context: it parks the thread.
    pub fn acquire_blocking(&self) {
        loop {
            match self.try_acquire() {
                None => return,
                Some(wait) => std::thread::sleep(wait),
            }
        }
    }

    /// Current token count (refilled first); test observability only
    #[cfg(test)]
    fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        state.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_acquires_immediately() {
        let limiter = RateLimiter::new(1.0, 5);
        let start = Instant::now();

        for _ in 0..5 {
            limiter.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_beyond_burst_waits_for_refill() {
        let limiter = RateLimiter::new(1.0, 1);
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;

        // Second token is due one full refill interval after the first
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_never_exceed_burst() {
        let limiter = RateLimiter::new(100.0, 3);

        // Let far more than burst_size worth of refill time pass
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(limiter.available() <= 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_run_rate_converges() {
        let limiter = RateLimiter::new(10.0, 1);
        let start = Instant::now();

        for _ in 0..21 {
            limiter.acquire().await;
        }

        // 1 burst token + 20 refilled at 10/s => ~2s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_millis(2200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquirers_all_complete() {
        let limiter = Arc::new(RateLimiter::new(10.0, 1));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 1 burst token + 9 refilled at 10/s => ~0.9s, and no waiter starves
        assert!(start.elapsed() >= Duration::from_millis(900));
        assert!(start.elapsed() < Duration::from_millis(1200));
    }

    #[test]
    fn test_acquire_blocking_paces_requests() {
        let limiter = RateLimiter::new(50.0, 1);
        let start = std::time::Instant::now();

        limiter.acquire_blocking();
        limiter.acquire_blocking();

        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
