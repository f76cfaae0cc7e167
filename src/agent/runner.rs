// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Orchestration loop
//!
//! Runs one turn as a bounded series of reason/act iterations:
//! - build the prompt from the fixed head and the scratchpad
//! - call the model with `Observation:` as the stop sequence
//! - parse the output into an answer or a tool call
//! - run the tool and append its observation
//!
//! Fetched datasets go into the turn's [`ExecutionScope`]; the model only
//! sees a short summary of them.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::compute::ExecutionScope;
use crate::config::Settings;
use crate::error::Result;
use crate::llm::message::Message;
use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::resilience::TokenBucket;
use crate::store::Resource;
use crate::tools::builtin::StoreDataRequest;
use crate::tools::{BuiltinTool, ParsedInput, Tool, ToolOutput, ToolRegistry};
use crate::utils::{strip_code_fences, truncate_chars, truncate_with_marker};

use super::parser::{parse_output, ActionParse, OBSERVATION_MARKER};
use super::prompt::{PromptBuilder, Scratchpad};
use super::types::{ConversationTurn, StepOutcome, ToolInvocation, TurnResult, TurnStatus};

/// Phrase that triggers the refusal short-circuit
pub const INJECTION_PHRASE: &str = "ignore previous instructions";

pub const REFUSAL_MESSAGE: &str = "I cannot process that request.";
pub const EXHAUSTED_MESSAGE: &str = "I could not generate a response in time.";
pub const UNSURE_MESSAGE: &str = "I am unsure how to proceed. Please clarify.";

/// Scope names a fetched dataset is stored under
pub const DATA_ALIASES: [&str; 2] = ["shopify_data", "orders_data"];

/// Number of field names shown in a dataset summary
const KEYS_PREVIEW: usize = 5;

const MONEY_FIELDS: [&str; 3] = ["total_price", "subtotal_price", "total_tax"];

/// Whether a message tries to override the assistant's instructions.
pub fn is_prompt_injection(message: &str) -> bool {
    message.to_lowercase().contains(INJECTION_PHRASE)
}

/// Per-turn state; dropped when the turn ends
struct TurnState {
    registry: ToolRegistry,
    scope: ExecutionScope,
    scratchpad: Scratchpad,
    iterations: usize,
    tool_calls: usize,
}

/// Runs turns against a model provider
pub struct AgentRunner {
    provider: Arc<dyn LlmProvider>,
    settings: Arc<Settings>,
    limiter: Option<Arc<TokenBucket>>,
}

impl AgentRunner {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        settings: Arc<Settings>,
        limiter: Option<Arc<TokenBucket>>,
    ) -> Self {
        Self {
            provider,
            settings,
            limiter,
        }
    }

    /// Run one turn to completion.
    ///
    /// Returns `Err` only for errors that must end the turn: model provider
    /// failures and fatal store errors. Everything else is fed back to the
    /// model as an observation.
    pub async fn run_turn(&self, turn: &ConversationTurn) -> Result<TurnResult> {
        if is_prompt_injection(&turn.message) {
            tracing::warn!(
                target: "shoplens.agent.loop",
                session_id = %turn.session_id,
                "refusing message that tries to override instructions"
            );
            return Ok(TurnResult {
                answer: REFUSAL_MESSAGE.to_string(),
                transcript: None,
                status: TurnStatus::Refused,
                iterations: 0,
                tool_calls: 0,
            });
        }

        let registry = ToolRegistry::for_turn(self.settings.clone(), self.limiter.clone());
        let head = PromptBuilder::new(&registry.definitions(), self.settings.agent.history_window)
            .build(turn);
        let mut state = TurnState {
            registry,
            scope: ExecutionScope::new(),
            scratchpad: Scratchpad::new(),
            iterations: 0,
            tool_calls: 0,
        };

        let max_iterations = self.settings.agent.max_iterations;
        let mut answer = None;

        while state.iterations < max_iterations {
            state.iterations += 1;
            tracing::debug!(
                target: "shoplens.agent.loop",
                session_id = %turn.session_id,
                iteration = state.iterations,
                max_iterations,
                "starting iteration"
            );

            match self.step(&head, &mut state).await {
                StepOutcome::Continue(observation) => {
                    state.scratchpad.push_observation(&observation);
                }
                StepOutcome::Answered(text) => {
                    answer = Some(text);
                    break;
                }
                StepOutcome::Error(err) => {
                    tracing::error!(
                        target: "shoplens.agent.loop",
                        session_id = %turn.session_id,
                        iteration = state.iterations,
                        error = %err,
                        "turn aborted"
                    );
                    return Err(err);
                }
            }
        }

        let (answer, status) = match answer {
            Some(text) if !text.trim().is_empty() => (text, TurnStatus::Answered),
            Some(_) => (EXHAUSTED_MESSAGE.to_string(), TurnStatus::Answered),
            None => {
                tracing::warn!(
                    target: "shoplens.agent.loop",
                    session_id = %turn.session_id,
                    max_iterations,
                    "iteration limit reached without an answer"
                );
                (EXHAUSTED_MESSAGE.to_string(), TurnStatus::Exhausted)
            }
        };

        tracing::info!(
            target: "shoplens.agent.loop",
            session_id = %turn.session_id,
            iterations = state.iterations,
            tool_calls = state.tool_calls,
            "turn finished"
        );

        Ok(TurnResult {
            answer: strip_code_fences(&answer),
            transcript: self
                .settings
                .agent
                .debug_transcript
                .then(|| state.scratchpad.as_text()),
            status,
            iterations: state.iterations,
            tool_calls: state.tool_calls,
        })
    }

    /// One model call and, when asked for, one tool call.
    async fn step(&self, head: &str, state: &mut TurnState) -> StepOutcome {
        let prompt = format!("{}{}", head, state.scratchpad.as_text());
        let request = CompletionRequest::new(
            self.settings.model.model.clone(),
            vec![Message::user(prompt)],
        )
        .with_max_tokens(self.settings.model.max_tokens)
        .with_temperature(self.settings.model.temperature)
        .with_stop(OBSERVATION_MARKER);

        let output = match self.provider.complete(request).await {
            Ok(response) => response.text,
            Err(err) => return StepOutcome::Error(err),
        };
        state.scratchpad.push_output(&output);

        match parse_output(&output) {
            ActionParse::Terminal(text) => StepOutcome::Answered(text),
            ActionParse::Action(invocation) => self.dispatch(invocation, state).await,
            ActionParse::None => {
                tracing::warn!(
                    target: "shoplens.agent.loop",
                    "no action or final answer found, treating output as the answer"
                );
                StepOutcome::Answered(direct_answer(&output))
            }
        }
    }

    async fn dispatch(&self, invocation: ToolInvocation, state: &mut TurnState) -> StepOutcome {
        let Some(tool) = state.registry.get(&invocation.name) else {
            tracing::warn!(
                target: "shoplens.agent.loop",
                tool = %invocation.name,
                "model asked for an unknown tool"
            );
            return StepOutcome::Continue(format!(
                "Unknown tool '{}'. Available tools: {}",
                invocation.name,
                state.registry.names().join(", ")
            ));
        };

        tracing::info!(
            target: "shoplens.agent.loop",
            tool = %invocation.name,
            input = %invocation.input,
            "tool selected"
        );

        let input = ParsedInput::decode(&invocation.input);
        let fetched = match tool {
            BuiltinTool::StoreData(_) => StoreDataRequest::from_input(&input)
                .ok()
                .and_then(|request| request.resource.parse::<Resource>().ok()),
            BuiltinTool::Compute(_) => None,
        };

        state.tool_calls += 1;
        let observation = match tool.invoke(input, &mut state.scope).await {
            Ok(output) => self.observe(output, fetched, &mut state.scope),
            Err(err) if err.is_fatal_for_turn() => return StepOutcome::Error(err),
            Err(err) => format!("Error executing tool: {}", err),
        };

        tracing::info!(
            target: "shoplens.agent.loop",
            observation = %truncate_chars(&observation, 200),
            "tool observation"
        );
        StepOutcome::Continue(observation)
    }

    /// Turn tool output into observation text, moving datasets into the scope.
    fn observe(
        &self,
        output: ToolOutput,
        resource: Option<Resource>,
        scope: &mut ExecutionScope,
    ) -> String {
        let mut records = match output {
            ToolOutput::Text(text) => {
                return truncate_with_marker(&text, self.settings.agent.observation_max_chars)
            }
            ToolOutput::Records(records) => records,
        };
        if resource == Some(Resource::Orders) {
            records.iter_mut().for_each(prepare_order);
        }

        let count = records.len();
        let data = Value::Array(records);
        let summary = dataset_summary(&data);
        tracing::info!(
            target: "shoplens.agent.loop",
            records = count,
            "injected dataset into scope, hiding it from the prompt"
        );
        for alias in DATA_ALIASES {
            scope.insert(alias, data.clone());
        }
        summary
    }
}

/// Use model output that has no markers as the answer.
fn direct_answer(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return UNSURE_MESSAGE.to_string();
    }
    match trimmed.get(..8) {
        Some(prefix) if prefix.eq_ignore_ascii_case("thought:") => trimmed[8..].trim().to_string(),
        _ => trimmed.to_string(),
    }
}

/// Summary shown to the model in place of a fetched dataset: the record
/// count and up to five field names, never any values.
pub fn dataset_summary(data: &Value) -> String {
    let (count, keys) = match data {
        Value::Array(items) => {
            let keys = match items.first() {
                None => "empty_list".to_string(),
                Some(Value::Object(first)) => preview_keys(first),
                Some(_) => "no_dict_items".to_string(),
            };
            (items.len(), keys)
        }
        Value::Object(map) => (1, preview_keys(map)),
        _ => (1, "unknown_keys".to_string()),
    };
    format!(
        "Successfully fetched {} records. \n\
         Data is stored in variable 'shopify_data' (also 'orders_data'). \n\
         Row keys preview: [{}, ...]\n\
         Do NOT output the full data. Use the compute tool to analyze it.",
        count, keys
    )
}

fn preview_keys(map: &Map<String, Value>) -> String {
    map.keys()
        .take(KEYS_PREVIEW)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Normalise an order for analysis: money strings become numbers, and a
/// missing customer or billing address becomes an `Unknown` placeholder.
pub fn prepare_order(order: &mut Value) {
    let Value::Object(fields) = order else {
        return;
    };

    for field in MONEY_FIELDS {
        let parsed = match fields.get(field) {
            Some(Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64),
            _ => None,
        };
        if let Some(number) = parsed {
            fields.insert(field.to_string(), Value::Number(number));
        }
    }

    if fields.get("billing_address").map_or(true, Value::is_null) {
        fields.insert(
            "billing_address".to_string(),
            json!({"city": "Unknown", "country": "Unknown"}),
        );
    }
    if fields.get("customer").map_or(true, Value::is_null) {
        fields.insert(
            "customer".to_string(),
            json!({"first_name": "Unknown", "last_name": "", "id": "Unknown"}),
        );
    }
}
