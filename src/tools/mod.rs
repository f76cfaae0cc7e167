// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for Shoplens
//!
//! The model can call two tools: one that fetches store records and one that
//! runs compute programs over the datasets held in the turn's
//! [`ExecutionScope`]. Tools are a closed set ([`BuiltinTool`]) behind the
//! [`Tool`] trait, collected into a [`ToolRegistry`] that is rebuilt for every
//! turn so no state leaks between turns.

pub mod builtin;
pub mod definition;

pub use definition::*;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::compute::ExecutionScope;
use crate::config::Settings;
use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::resilience::TokenBucket;

pub use builtin::{ComputeTool, StoreDataTool};

/// Decoded tool input
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedInput {
    /// A JSON object
    Structured(Map<String, Value>),
    /// Anything that was not a JSON object
    Raw(String),
}

impl ParsedInput {
    /// Decode raw action input.
    ///
    /// Tries JSON first. When that fails and the text contains `}`, retries on
    /// the prefix ending at the last `}` (models often append commentary
    /// after the object). Otherwise the text is passed through unchanged.
    pub fn decode(raw: &str) -> Self {
        let text = raw.trim();
        match serde_json::from_str::<Value>(text) {
            Ok(value) => return Self::from_value(value, text),
            Err(_) => {
                if let Some(end) = text.rfind('}') {
                    if let Ok(value) = serde_json::from_str::<Value>(&text[..=end]) {
                        return Self::from_value(value, text);
                    }
                }
            }
        }
        ParsedInput::Raw(text.to_string())
    }

    fn from_value(value: Value, original: &str) -> Self {
        match value {
            Value::Object(map) => ParsedInput::Structured(map),
            Value::String(s) => ParsedInput::Raw(s),
            _ => ParsedInput::Raw(original.to_string()),
        }
    }

    /// Get a string field of a structured input
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self {
            ParsedInput::Structured(map) => map.get(key).and_then(Value::as_str),
            ParsedInput::Raw(_) => None,
        }
    }
}

/// Output from a tool
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// A list of records; materialized into the scope, not shown to the model
    Records(Vec<Value>),
    /// Text shown to the model as-is (including tagged error strings)
    Text(String),
}

/// Trait for implementing tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool definition for the prompt catalogue
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with decoded input against the turn's scope.
    ///
    /// Errors that the model can act on come back as `ToolOutput::Text`; an
    /// `Err` is either turned into an `Error executing tool:` observation or,
    /// when fatal, ends the turn.
    async fn invoke(&self, input: ParsedInput, scope: &mut ExecutionScope) -> Result<ToolOutput>;
}

/// The closed set of tools the loop can dispatch to
pub enum BuiltinTool {
    StoreData(StoreDataTool),
    Compute(ComputeTool),
}

#[async_trait]
impl Tool for BuiltinTool {
    fn name(&self) -> &str {
        match self {
            BuiltinTool::StoreData(tool) => tool.name(),
            BuiltinTool::Compute(tool) => tool.name(),
        }
    }

    fn definition(&self) -> ToolDefinition {
        match self {
            BuiltinTool::StoreData(tool) => tool.definition(),
            BuiltinTool::Compute(tool) => tool.definition(),
        }
    }

    async fn invoke(&self, input: ParsedInput, scope: &mut ExecutionScope) -> Result<ToolOutput> {
        match self {
            BuiltinTool::StoreData(tool) => tool.invoke(input, scope).await,
            BuiltinTool::Compute(tool) => tool.invoke(input, scope).await,
        }
    }
}

/// Registry of available tools, keyed by name
pub struct ToolRegistry {
    tools: HashMap<String, BuiltinTool>,
    /// Registration order, for a stable catalogue
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Fresh registry with the store-data and compute tools for one turn
    pub fn for_turn(settings: Arc<Settings>, limiter: Option<Arc<TokenBucket>>) -> Self {
        let mut registry = Self::new();
        registry.register(BuiltinTool::StoreData(StoreDataTool::new(settings, limiter)));
        registry.register(BuiltinTool::Compute(ComputeTool));
        registry
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: BuiltinTool) {
        let name = tool.name().to_string();
        if !self.order.contains(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&BuiltinTool> {
        self.tools.get(name)
    }

    /// Get all tool definitions in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.definition())
            .collect()
    }

    /// List all tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
