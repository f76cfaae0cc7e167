// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock LLM provider for testing
//!
//! Replays scripted completions in order so orchestration scenarios can be
//! exercised without real API calls.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ApiError, Result, ShoplensError};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, LlmProvider, StopReason, Usage,
};

/// One scripted reply
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return this text
    Text(String),
    /// Fail as a throttled provider
    RateLimited(String),
    /// Fail with a server error
    ServerError { status: u16, message: String },
}

impl MockResponse {
    fn into_result(self, model: &str) -> Result<CompletionResponse> {
        match self {
            MockResponse::Text(text) => Ok(CompletionResponse {
                id: format!("mock_{}", uuid::Uuid::new_v4().simple()),
                model: model.to_string(),
                text,
                stop_reason: Some(StopReason::EndTurn),
                usage: Usage::default(),
            }),
            MockResponse::RateLimited(message) => {
                Err(ShoplensError::Api(ApiError::RateLimited(message)))
            }
            MockResponse::ServerError { status, message } => {
                Err(ShoplensError::Api(ApiError::ServerError { status, message }))
            }
        }
    }
}

/// A mock LLM provider for testing
#[derive(Clone, Default)]
pub struct MockProvider {
    /// Scripted responses
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// Call counter
    call_count: Arc<AtomicUsize>,
    /// Recorded requests
    recorded_requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl MockProvider {
    /// Create a mock provider with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `text`
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_script(vec![MockResponse::Text(text.into())])
    }

    /// Queue text responses (returned in order, the last one repeats)
    pub fn with_responses<S: Into<String>>(self, texts: Vec<S>) -> Self {
        self.with_script(texts.into_iter().map(|t| MockResponse::Text(t.into())).collect())
    }

    /// Queue arbitrary scripted responses
    pub fn with_script(self, script: Vec<MockResponse>) -> Self {
        *lock(&self.responses) = script;
        self
    }

    /// Get the number of times complete() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get all recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        lock(&self.recorded_requests).clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<CompletionRequest> {
        lock(&self.recorded_requests).last().cloned()
    }

    /// Get the next response
    fn next_response(&self) -> MockResponse {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = lock(&self.responses);
        if responses.is_empty() {
            MockResponse::Text(String::new())
        } else {
            responses[count.min(responses.len() - 1)].clone()
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model.clone();
        lock(&self.recorded_requests).push(request);
        self.next_response().into_result(&model)
    }
}
