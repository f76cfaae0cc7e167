// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Outbound call resilience: backoff/retry and client-side rate limiting.

pub mod limiter;
pub mod retry;

pub use limiter::TokenBucket;
pub use retry::{with_retry, RetryPolicy};
