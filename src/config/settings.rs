// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Shoplens
//!
//! Handles loading settings from ~/.shoplens/settings.json

use serde::{Deserialize, Serialize};

mod io;
mod validation;

/// Main settings structure, stored in ~/.shoplens/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Upstream store connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Language model provider
    #[serde(default)]
    pub model: ModelConfig,

    /// Orchestration loop limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Retry and backoff settings for store API calls
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Client-side rate limiting for store API calls
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

/// Shopify Admin API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store domain, e.g. `my-shop.myshopify.com`
    #[serde(default)]
    pub store_url: String,

    /// Access token (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Environment variable name for the access token
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// Admin API version segment
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum pages followed per fetch
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Override for the API base URL (tests, proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// OpenAI-compatible chat completions provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_model_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the chat completions API
    #[serde(default = "default_model_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_model_name")]
    pub model: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens generated per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_model_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Orchestration loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum reason/act iterations per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Maximum characters of a non-dataset observation
    #[serde(default = "default_observation_max_chars")]
    pub observation_max_chars: usize,

    /// Number of prior messages included in the prompt
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Return the scratchpad to the caller
    #[serde(default = "default_true")]
    pub debug_transcript: bool,
}

/// Retry and backoff configuration for store API calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Total attempts per request, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Growth factor applied per retry
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Maximum delay in milliseconds (cap for backoff)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter percentage (0.0 to 1.0); zero keeps the schedule deterministic
    #[serde(default)]
    pub jitter: f64,
}

/// Token bucket settings for outbound store calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether outbound store requests are gated by the limiter
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Burst size
    #[serde(default = "default_bucket_capacity")]
    pub capacity: u32,

    /// Tokens added per second
    #[serde(default = "default_refill_per_second")]
    pub refill_per_second: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_url: String::new(),
            access_token: None,
            access_token_env: default_access_token_env(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
            max_pages: default_max_pages(),
            base_url: None,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_model_api_key_env(),
            base_url: default_model_base_url(),
            model: default_model_name(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_model_timeout_secs(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            observation_max_chars: default_observation_max_chars(),
            history_window: default_history_window(),
            debug_transcript: true,
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter: 0.0,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_bucket_capacity(),
            refill_per_second: default_refill_per_second(),
        }
    }
}

impl StoreConfig {
    /// Base URL for Admin API requests, without a trailing slash.
    pub fn api_base_url(&self) -> String {
        if let Some(base) = &self.base_url {
            return base.trim_end_matches('/').to_string();
        }
        let host = self
            .store_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        format!("https://{}/admin/api/{}", host, self.api_version)
    }
}

fn default_access_token_env() -> String {
    "SHOPIFY_ACCESS_TOKEN".to_string()
}

fn default_api_version() -> String {
    "2025-07".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_pages() -> u32 {
    10
}

fn default_model_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_model_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model_name() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_model_timeout_secs() -> u64 {
    60
}

fn default_max_iterations() -> usize {
    15
}

fn default_observation_max_chars() -> usize {
    5000
}

fn default_history_window() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    32000
}

fn default_bucket_capacity() -> u32 {
    40
}

fn default_refill_per_second() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}
