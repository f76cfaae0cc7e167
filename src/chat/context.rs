// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Application context
//!
//! Built once at startup and shared by reference with every turn.

use std::sync::Arc;

use crate::agent::AgentRunner;
use crate::config::Settings;
use crate::error::Result;
use crate::llm::provider::LlmProvider;
use crate::llm::providers::OpenAiCompatProvider;
use crate::resilience::TokenBucket;

/// Long-lived collaborators of the assistant
#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub provider: Arc<dyn LlmProvider>,
    /// Shared limiter for outbound store calls
    pub limiter: Option<Arc<TokenBucket>>,
}

impl AppContext {
    /// Build a context around an existing provider.
    pub fn new(settings: Settings, provider: Arc<dyn LlmProvider>) -> Self {
        let limiter = TokenBucket::from_config(&settings.rate_limits).map(Arc::new);
        Self {
            settings: Arc::new(settings),
            provider,
            limiter,
        }
    }

    /// Validate settings and connect the configured model provider.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let provider = OpenAiCompatProvider::from_settings(&settings)?;
        tracing::debug!(
            target: "shoplens.config",
            model = %settings.model.model,
            base_url = %settings.model.base_url,
            "model provider configured"
        );
        Ok(Self::new(settings, Arc::new(provider)))
    }

    /// A runner for one turn
    pub fn runner(&self) -> AgentRunner {
        AgentRunner::new(
            self.provider.clone(),
            self.settings.clone(),
            self.limiter.clone(),
        )
    }

    /// Store URL with a scheme, as used to open sessions
    pub fn store_url(&self) -> String {
        let url = self.settings.get_store_url();
        if url.starts_with("http://") || url.starts_with("https://") {
            url
        } else {
            format!("https://{}", url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock_provider::MockProvider;

    #[test]
    fn test_new_builds_limiter_from_settings() {
        let context = AppContext::new(Settings::default(), Arc::new(MockProvider::new()));
        assert!(context.limiter.is_some());

        let mut settings = Settings::default();
        settings.rate_limits.enabled = false;
        let context = AppContext::new(settings, Arc::new(MockProvider::new()));
        assert!(context.limiter.is_none());
    }

    #[test]
    fn test_from_settings_requires_model_key() {
        let mut settings = Settings::default();
        settings.model.api_key_env = "SHOPLENS_TEST_UNSET_MODEL_KEY".to_string();
        let err = AppContext::from_settings(settings).err().unwrap();
        assert!(err.to_string().contains("SHOPLENS_TEST_UNSET_MODEL_KEY"));
    }

    #[test]
    fn test_store_url_gets_scheme() {
        let mut settings = Settings::default();
        settings.store.store_url = "demo.myshopify.com".to_string();
        let context = AppContext::new(settings, Arc::new(MockProvider::new()));
        if std::env::var("SHOPIFY_STORE_URL").is_err() {
            assert_eq!(context.store_url(), "https://demo.myshopify.com");
        }
    }
}
