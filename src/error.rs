// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Shoplens
//!
//! This module defines all error types used throughout the application.

use thiserror::Error;

use crate::compute::ComputeError;

/// Substrings that identify a throttled model provider call.
const MODEL_RATE_LIMIT_MARKERS: &[&str] = &["429", "Too Many Requests", "RESOURCE_EXHAUSTED"];

/// Main error type for Shoplens operations
#[derive(Error, Debug)]
pub enum ShoplensError {
    /// Model provider errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Upstream store API errors
    #[error("Shopify error: {0}")]
    Store(#[from] StoreError),

    /// Compute language errors
    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),

    /// Malformed caller input, rejected before the agent loop starts
    #[error("Validation error: {0}")]
    Validation(String),

    /// Tool execution errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session errors
    #[error("Session error: {0}")]
    Session(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Model provider error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the provider
    #[error("Rate limited (429 Too Many Requests): {0}")]
    RateLimited(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,
}

/// Upstream store API error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// 401/403 from the store; never retried
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 429 persisted through the whole retry budget
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Transport-level failure (connect, timeout, body read)
    #[error("Network Error: {0}")]
    Network(String),

    /// Any other non-2xx status
    #[error("HTTP Error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Body could not be decoded as the expected envelope
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for Shoplens operations
pub type Result<T> = std::result::Result<T, ShoplensError>;

impl ShoplensError {
    /// Whether this error must end the current turn instead of being fed
    /// back to the model as an observation.
    pub fn is_fatal_for_turn(&self) -> bool {
        match self {
            ShoplensError::Store(store) => store.is_fatal(),
            ShoplensError::Api(_) | ShoplensError::Http(_) => true,
            _ => false,
        }
    }

    /// Whether this error is a model provider throttling signal.
    pub fn is_model_rate_limit(&self) -> bool {
        match self {
            ShoplensError::Api(ApiError::RateLimited(_)) => true,
            ShoplensError::Api(_) | ShoplensError::Http(_) => {
                let text = self.to_string();
                MODEL_RATE_LIMIT_MARKERS
                    .iter()
                    .any(|marker| text.contains(marker))
            }
            _ => false,
        }
    }
}

impl StoreError {
    /// Auth and exhausted rate limits abort the turn; everything else is
    /// reported to the model.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Auth(_) | StoreError::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_tool_execution() {
        let err = ShoplensError::ToolExecution("tool failed".to_string());
        assert!(err.to_string().contains("tool failed"));
    }

    #[test]
    fn test_error_validation() {
        let err = ShoplensError::Validation("message too long".to_string());
        assert!(err.to_string().contains("Validation error"));
        assert!(err.to_string().contains("message too long"));
    }

    #[test]
    fn test_error_config() {
        let err = ShoplensError::Config("bad config".to_string());
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ShoplensError = io_err.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::RateLimited { attempts: 5 };
        assert!(err.to_string().contains("5 attempts"));

        let err = StoreError::Upstream {
            status: 500,
            message: "internal".to_string(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("internal"));
    }

    #[test]
    fn test_store_error_fatality() {
        assert!(StoreError::Auth("denied".to_string()).is_fatal());
        assert!(StoreError::RateLimited { attempts: 5 }.is_fatal());
        assert!(!StoreError::Network("reset".to_string()).is_fatal());
        assert!(!StoreError::Upstream {
            status: 404,
            message: "missing".to_string()
        }
        .is_fatal());
    }

    #[test]
    fn test_fatal_for_turn() {
        let err: ShoplensError = StoreError::Auth("denied".to_string()).into();
        assert!(err.is_fatal_for_turn());

        let err = ShoplensError::ToolExecution("bad input".to_string());
        assert!(!err.is_fatal_for_turn());

        let err: ShoplensError = ApiError::Timeout.into();
        assert!(err.is_fatal_for_turn());
    }

    #[test]
    fn test_model_rate_limit_detection() {
        let err: ShoplensError = ApiError::RateLimited("slow down".to_string()).into();
        assert!(err.is_model_rate_limit());

        let err: ShoplensError = ApiError::ServerError {
            status: 503,
            message: "RESOURCE_EXHAUSTED: quota".to_string(),
        }
        .into();
        assert!(err.is_model_rate_limit());

        let err: ShoplensError = ApiError::ServerError {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert!(!err.is_model_rate_limit());
    }

    #[test]
    fn test_store_rate_limit_is_not_model_rate_limit() {
        let err: ShoplensError = StoreError::RateLimited { attempts: 5 }.into();
        assert!(!err.is_model_rate_limit());
    }
}
