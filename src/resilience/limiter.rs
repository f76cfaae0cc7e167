// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Token bucket rate limiter
//!
//! Gates outbound calls to a sustained rate with a bounded burst. The bucket
//! lock is held while a caller sleeps for its shortfall, so waiters are
//! served one at a time in arrival order.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::settings::RateLimitConfig;
use crate::error::{Result, ShoplensError};

/// Slack for float drift when comparing token counts.
const TOKEN_EPSILON: f64 = 1e-9;

/// Shortest sleep issued while waiting for tokens.
const MIN_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket with a monotonic clock
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, refill_per_second: f64) -> Self {
        Self {
            capacity: capacity as f64,
            refill_per_second,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Build a bucket from settings, or `None` when limiting is disabled.
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.capacity, config.refill_per_second))
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.tokens =
            (state.tokens + elapsed.as_secs_f64() * self.refill_per_second).min(self.capacity);
        state.last_refill = now;
    }

    /// Wait until `tokens` are available and take them. Returns how long the
    /// caller was suspended.
    pub async fn acquire(&self, tokens: u32) -> Result<Duration> {
        let needed = tokens as f64;
        if needed > self.capacity {
            return Err(ShoplensError::Validation(format!(
                "requested {} tokens from a bucket of capacity {}",
                tokens, self.capacity
            )));
        }

        let start = Instant::now();
        let mut state = self.state.lock().await;

        loop {
            self.refill(&mut state);

            if state.tokens + TOKEN_EPSILON >= needed {
                state.tokens = (state.tokens - needed).max(0.0);
                return Ok(start.elapsed());
            }

            let shortfall = needed - state.tokens;
            let wait = Duration::from_secs_f64(shortfall / self.refill_per_second).max(MIN_WAIT);
            tracing::debug!(
                target: "shoplens.resilience",
                shortfall,
                wait_ms = wait.as_millis() as u64,
                "rate limiter waiting for tokens"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_immediate() {
        let bucket = TokenBucket::new(5, 10.0);
        let waited = bucket.acquire(5).await.unwrap();
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_refill_after_burst() {
        let bucket = TokenBucket::new(5, 10.0);
        bucket.acquire(5).await.unwrap();

        let waited = bucket.acquire(1).await.unwrap();
        assert!(waited >= Duration::from_millis(90), "waited {:?}", waited);
        assert!(waited <= Duration::from_millis(150), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_refill_rate() {
        let bucket = TokenBucket::new(2, 1.0);
        bucket.acquire(2).await.unwrap();

        let waited = bucket.acquire(1).await.unwrap();
        assert!(waited >= Duration::from_millis(900), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped_at_capacity() {
        let bucket = TokenBucket::new(3, 100.0);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(bucket.acquire(3).await.unwrap(), Duration::ZERO);

        let waited = bucket.acquire(1).await.unwrap();
        assert!(waited >= Duration::from_millis(9), "waited {:?}", waited);
    }

    #[tokio::test]
    async fn test_request_above_capacity_rejected() {
        let bucket = TokenBucket::new(2, 1.0);
        assert!(bucket.acquire(3).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_are_serialized() {
        let bucket = Arc::new(TokenBucket::new(1, 10.0));
        bucket.acquire(1).await.unwrap();

        let first = {
            let bucket = bucket.clone();
            tokio::spawn(async move { bucket.acquire(1).await.unwrap() })
        };
        let second = {
            let bucket = bucket.clone();
            tokio::spawn(async move { bucket.acquire(1).await.unwrap() })
        };

        let a = first.await.unwrap();
        let b = second.await.unwrap();
        // One caller waits ~100ms, the other ~200ms.
        assert!(a.max(b) >= Duration::from_millis(190));
    }

    #[test]
    fn test_from_config_disabled() {
        let config = RateLimitConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(TokenBucket::from_config(&config).is_none());
    }
}
