//! Permit limiter
//!
//! A token bucket holding at most one second worth of permits (never fewer
//! than one). Permits are added at `permits_per_second` and consumed one per
//! acquire. When the bucket is empty an acquire may reserve a future permit,
//! waiting for it, as long as the wait fits in the acquire timeout.
//!
//! A rate of zero is valid and refuses every acquire.
//!
//! ```rust
//! use zeus_ratelimit::RateLimiter;
//!
//! let limiter = RateLimiter::new(2.0).unwrap();
//!
//! assert!(limiter.try_acquire());
//! assert!(limiter.try_acquire());
//! assert!(!limiter.try_acquire());
//! ```

use crate::error::{RateLimitError, RateLimitResult};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    /// Available permits; negative when future permits are reserved
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket permit limiter
#[derive(Debug)]
pub struct RateLimiter {
    permits_per_second: f64,
    capacity: f64,
    acquire_timeout: Option<Duration>,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// Create a limiter admitting `permits_per_second` with no acquire timeout
    pub fn new(permits_per_second: f64) -> RateLimitResult<Self> {
        if !permits_per_second.is_finite() || permits_per_second < 0.0 {
            return Err(RateLimitError::config(format!(
                "permits per second must be a non-negative number, got {}",
                permits_per_second
            )));
        }

        let capacity = permits_per_second.max(1.0);
        Ok(Self {
            permits_per_second,
            capacity,
            acquire_timeout: None,
            state: Mutex::new(BucketState {
                tokens: if permits_per_second > 0.0 { capacity } else { 0.0 },
                last_refill: Instant::now(),
            }),
        })
    }

    /// Allow acquires to wait up to `timeout` for a permit
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    pub fn permits_per_second(&self) -> f64 {
        self.permits_per_second
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout
    }

    /// Take a permit if one is available right now
    pub fn try_acquire(&self) -> bool {
        self.reserve(Duration::ZERO).is_ok()
    }

    /// Take a permit, waiting for it when the acquire timeout allows
    pub async fn acquire(&self) -> RateLimitResult<()> {
        let wait = self.reserve(self.acquire_timeout.unwrap_or(Duration::ZERO))?;
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        Ok(())
    }

    /// Currently available permits, rounded down
    pub fn available(&self) -> u64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens.max(0.0) as u64
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();

        state.tokens = (state.tokens + elapsed * self.permits_per_second).min(self.capacity);
        state.last_refill = now;
    }

    /// Reserve one permit, returning how long the caller must wait for it
    fn reserve(&self, timeout: Duration) -> RateLimitResult<Duration> {
        if self.permits_per_second == 0.0 {
            return Err(RateLimitError::LimitExceeded { retry_after: None });
        }

        let mut state = self.state.lock();
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(Duration::ZERO);
        }

        // A tiny rate can need a wait longer than any Duration
        let Ok(required) =
            Duration::try_from_secs_f64((1.0 - state.tokens) / self.permits_per_second)
        else {
            return Err(RateLimitError::LimitExceeded { retry_after: None });
        };
        if required > timeout {
            return Err(if timeout.is_zero() {
                RateLimitError::LimitExceeded {
                    retry_after: Some(required),
                }
            } else {
                RateLimitError::AcquireTimeout { timeout, required }
            });
        }

        state.tokens -= 1.0;
        Ok(required)
    }
}
