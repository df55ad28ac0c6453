//! Token-bucket rate limiting for Insight API calls.
//!
//! The bucket holds up to `capacity` tokens and refills continuously at
//! `capacity / interval` tokens per second. Every request consumes one token;
//! when the bucket is empty the caller sleeps until a full token has accrued.
//!
//! The limiter is shared by all concurrent requests of a client. The state
//! lives behind a `tokio::sync::Mutex` that is held across the sleep, so
//! waiting callers are released one at a time in arrival order.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

use super::error::{ApiError, Result};

/// A token-bucket rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum number of tokens (burst size).
    capacity: f64,
    /// Time for an empty bucket to refill completely.
    interval: Duration,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_check: Instant,
}

impl RateLimiter {
    /// Create a rate limiter allowing `tokens` requests per `interval`.
    ///
    /// The bucket starts full.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidConfig` if either argument is zero.
    pub fn new(tokens: u32, interval: Duration) -> Result<Self> {
        if tokens == 0 || interval.is_zero() {
            return Err(ApiError::InvalidConfig(
                "rate limit tokens and interval must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            capacity: f64::from(tokens),
            interval,
            state: Mutex::new(BucketState {
                tokens: f64::from(tokens),
                last_check: Instant::now(),
            }),
        })
    }

    /// Tokens added per second.
    fn refill_rate(&self) -> f64 {
        self.capacity / self.interval.as_secs_f64()
    }

    /// Take one token, sleeping first if the bucket is empty.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_check).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate()).min(self.capacity);
        state.last_check = now;

        if state.tokens < 1.0 {
            let wait = Duration::from_secs_f64((1.0 - state.tokens) / self.refill_rate());
            trace!(wait_ms = wait.as_millis() as u64, "Rate limit: waiting for token");
            tokio::time::sleep(wait).await;

            // The sleep accrued exactly the missing fraction, which this call consumes.
            state.tokens = 0.0;
            state.last_check = Instant::now();
        } else {
            state.tokens -= 1.0;
        }
    }

    /// Tokens currently available, after refilling.
    pub async fn available(&self) -> f64 {
        let state = self.state.lock().await;
        let elapsed = Instant::now().duration_since(state.last_check).as_secs_f64();
        (state.tokens + elapsed * self.refill_rate()).min(self.capacity)
    }
}
