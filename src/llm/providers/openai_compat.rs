// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI-compatible chat completions provider
//!
//! Works against any `/chat/completions` endpoint that speaks the OpenAI wire
//! format. The default configuration points at Groq.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{ApiError, Result, ShoplensError};
use crate::llm::message::{Message, Role};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, LlmProvider, StopReason, Usage,
};

/// Chat completions provider for OpenAI-compatible APIs
pub struct OpenAiCompatProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatProvider {
    /// Create a provider for `base_url` (e.g. `https://api.groq.com/openai/v1`).
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build from settings, failing when no API key is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.get_model_api_key().ok_or_else(|| {
            ShoplensError::Config(format!(
                "no model API key; set {}",
                settings.model.api_key_env
            ))
        })?;
        Self::new(
            api_key,
            settings.model.base_url.clone(),
            Duration::from_secs(settings.model.request_timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Convert internal messages to the OpenAI format
    fn convert_messages(messages: &[Message], system: Option<&str>) -> Vec<ChatMessage> {
        let mut result = Vec::with_capacity(messages.len() + 1);

        if let Some(sys) = system {
            result.push(ChatMessage {
                role: "system".to_string(),
                content: sys.to_string(),
            });
        }

        for m in messages.iter().filter(|m| m.role != Role::System) {
            result.push(ChatMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            });
        }

        result
    }

    /// Build the request body
    fn build_request(request: &CompletionRequest) -> ChatRequest {
        ChatRequest {
            model: request.model.clone(),
            messages: Self::convert_messages(&request.messages, request.system.as_deref()),
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
            stop: if request.stop.is_empty() {
                None
            } else {
                Some(request.stop.clone())
            },
        }
    }

    /// Parse an error response
    fn parse_error(status: u16, body: &str) -> ShoplensError {
        let message = serde_json::from_str::<ChatError>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status {
            401 | 403 => ShoplensError::Api(ApiError::AuthenticationFailed),
            429 => ShoplensError::Api(ApiError::RateLimited(message)),
            _ => ShoplensError::Api(ApiError::ServerError { status, message }),
        }
    }

    fn transport_error(err: reqwest::Error) -> ShoplensError {
        if err.is_timeout() {
            ShoplensError::Api(ApiError::Timeout)
        } else {
            ShoplensError::Api(ApiError::Network(err.to_string()))
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = Self::build_request(&request);

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body));
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ShoplensError::Api(ApiError::InvalidResponse(e.to_string())))?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            ShoplensError::Api(ApiError::InvalidResponse(
                "No choices in response".to_string(),
            ))
        })?;

        let stop_reason = choice.finish_reason.as_deref().map(|r| match r {
            "length" => StopReason::MaxTokens,
            "stop" if !request.stop.is_empty() => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        });

        let usage = api_response.usage.unwrap_or_default();

        Ok(CompletionResponse {
            id: api_response.id.unwrap_or_default(),
            model: api_response.model.unwrap_or(request.model),
            text: choice.message.content.unwrap_or_default(),
            stop_reason,
            usage: Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    id: Option<String>,
    model: Option<String>,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    error: ChatErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ChatErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("test-key", base_url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_convert_messages_with_system() {
        let messages = vec![
            Message::user("Hello"),
            Message::system("ignored"),
            Message::assistant("Hi"),
        ];
        let converted = OpenAiCompatProvider::convert_messages(&messages, Some("policy"));

        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0].role, "system");
        assert_eq!(converted[0].content, "policy");
        assert_eq!(converted[1].role, "user");
        assert_eq!(converted[2].role, "assistant");
    }

    #[test]
    fn test_build_request_includes_stop() {
        let request =
            CompletionRequest::new("m", vec![Message::user("q")]).with_stop("Observation:");
        let body = serde_json::to_value(OpenAiCompatProvider::build_request(&request)).unwrap();

        assert_eq!(body["stop"], serde_json::json!(["Observation:"]));
        assert_eq!(body["temperature"], serde_json::json!(0.0));
    }

    #[test]
    fn test_build_request_omits_empty_stop() {
        let request = CompletionRequest::new("m", vec![Message::user("q")]);
        let body = serde_json::to_value(OpenAiCompatProvider::build_request(&request)).unwrap();
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn test_parse_error_rate_limit() {
        let body = r#"{"error": {"message": "Rate limit reached for model", "type": "tokens"}}"#;
        let err = OpenAiCompatProvider::parse_error(429, body);
        assert!(matches!(err, ShoplensError::Api(ApiError::RateLimited(ref m)) if m.contains("Rate limit reached")));
        assert!(err.is_model_rate_limit());
    }

    #[test]
    fn test_parse_error_auth_and_server() {
        assert!(matches!(
            OpenAiCompatProvider::parse_error(401, "nope"),
            ShoplensError::Api(ApiError::AuthenticationFailed)
        ));
        match OpenAiCompatProvider::parse_error(500, "plain text") {
            ShoplensError::Api(ApiError::ServerError { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "plain text");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"stop": ["Observation:"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cmpl-1",
                "model": "llama-3.3-70b-versatile",
                "choices": [{
                    "message": {"role": "assistant", "content": "Final Answer: hi"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = CompletionRequest::new("llama-3.3-70b-versatile", vec![Message::user("q")])
            .with_stop("Observation:");
        let response = provider(&server.uri()).complete(request).await.unwrap();

        assert_eq!(response.text, "Final Answer: hi");
        assert_eq!(response.stop_reason, Some(StopReason::StopSequence));
        assert_eq!(response.usage.total_tokens(), 16);
    }

    #[tokio::test]
    async fn test_complete_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .complete(CompletionRequest::new("m", vec![Message::user("q")]))
            .await
            .unwrap_err();
        assert!(err.is_model_rate_limit());
    }

    #[tokio::test]
    async fn test_complete_without_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .complete(CompletionRequest::new("m", vec![Message::user("q")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No choices"));
    }
}
