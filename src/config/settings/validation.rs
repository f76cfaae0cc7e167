// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{Result, ShoplensError};

use super::Settings;

impl Settings {
    /// Get the store access token, checking env var first.
    pub fn get_store_access_token(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.store.access_token_env)
            .ok()
            .or_else(|| self.store.access_token.clone())
    }

    /// Get the model provider API key, checking env var first.
    pub fn get_model_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.model.api_key_env)
            .ok()
            .or_else(|| self.model.api_key.clone())
    }

    /// Get the store domain, checking `SHOPIFY_STORE_URL` first.
    pub fn get_store_url(&self) -> String {
        std::env::var("SHOPIFY_STORE_URL")
            .ok()
            .unwrap_or_else(|| self.store.store_url.clone())
    }

    /// Reject values the runtime cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            return Err(ShoplensError::Config(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.agent.observation_max_chars == 0 {
            return Err(ShoplensError::Config(
                "agent.observation_max_chars must be at least 1".to_string(),
            ));
        }
        if self.resilience.max_attempts == 0 {
            return Err(ShoplensError::Config(
                "resilience.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.resilience.multiplier < 1.0 {
            return Err(ShoplensError::Config(
                "resilience.multiplier must be >= 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.resilience.jitter) {
            return Err(ShoplensError::Config(
                "resilience.jitter must be within 0.0..=1.0".to_string(),
            ));
        }
        if self.resilience.base_delay_ms > self.resilience.max_delay_ms {
            return Err(ShoplensError::Config(
                "resilience.base_delay_ms exceeds resilience.max_delay_ms".to_string(),
            ));
        }
        if self.rate_limits.enabled
            && (self.rate_limits.capacity == 0 || self.rate_limits.refill_per_second <= 0.0)
        {
            return Err(ShoplensError::Config(
                "rate_limits needs a positive capacity and refill rate".to_string(),
            ));
        }
        if self.store.max_pages == 0 {
            return Err(ShoplensError::Config(
                "store.max_pages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
