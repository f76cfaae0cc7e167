// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Retry logic for store API calls with exponential backoff

use crate::config::settings::ResilienceConfig;
use crate::error::{Result, ShoplensError, StoreError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Backoff schedule for a single request
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds
    pub base_delay_ms: u64,
    /// Growth factor per retry
    pub multiplier: f64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Jitter percentage (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for RetryPolicy {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay_ms,
            multiplier: config.multiplier,
            max_delay_ms: config.max_delay_ms,
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    ///
    /// With the defaults this yields 2s, 4s, 8s, 16s, then 32s forever.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let exponential_ms = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped_ms = exponential_ms.min(self.max_delay_ms as f64) as u64;

        if self.jitter <= 0.0 {
            return Duration::from_millis(capped_ms);
        }

        let jitter_range = (capped_ms as f64 * self.jitter) as i64;
        let mut rng = rand::rng();
        let jitter_ms = rng.random_range(-jitter_range..=jitter_range);
        let final_ms = (capped_ms as i64 + jitter_ms).max(0) as u64;
        Duration::from_millis(final_ms)
    }
}

/// Only upstream throttling is retried; every other failure propagates.
pub fn is_retryable(error: &ShoplensError) -> bool {
    matches!(error, ShoplensError::Store(StoreError::RateLimited { .. }))
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt budget is spent.
///
/// The operation receives the 1-based attempt number so it can report it in
/// its own errors.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    policy: &RetryPolicy,
    operation_name: &str,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 1;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        target: "shoplens.resilience",
                        operation = operation_name,
                        attempts = attempt,
                        "request succeeded after retries"
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if !is_retryable(&error) {
                    return Err(error);
                }

                if attempt >= policy.max_attempts {
                    tracing::warn!(
                        target: "shoplens.resilience",
                        operation = operation_name,
                        attempts = attempt,
                        "retry budget exhausted"
                    );
                    return Err(error);
                }

                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    target: "shoplens.resilience",
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "rate limited; backing off"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
