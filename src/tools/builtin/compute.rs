// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Compute tool
//!
//! Runs a compute program against the datasets fetched earlier in the turn.

use async_trait::async_trait;

use crate::compute::{evaluate_to_text, ExecutionScope};
use crate::error::{Result, ShoplensError};
use crate::llm::provider::ToolDefinition;
use crate::tools::{ParsedInput, SchemaBuilder, Tool, ToolOutput};

/// Keys accepted for the program when the input is a JSON object
const PROGRAM_KEYS: &[&str] = &["code", "query", "expression"];

/// Tool that evaluates compute programs
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeTool;

impl ComputeTool {
    fn program(input: &ParsedInput) -> Result<String> {
        let text = match input {
            ParsedInput::Raw(text) => text.as_str(),
            ParsedInput::Structured(_) => PROGRAM_KEYS
                .iter()
                .find_map(|key| input.get_str(key))
                .ok_or_else(|| {
                    ShoplensError::ToolExecution(
                        "expected a program as plain text or under \"code\"".to_string(),
                    )
                })?,
        };
        Ok(unwrap_fence(text))
    }
}

/// Take the body of a fenced block (dropping its language tag) and strip
/// stray backticks.
fn unwrap_fence(text: &str) -> String {
    let trimmed = text.trim();
    let body = match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = match rest.find('\n') {
                Some(newline) if rest[..newline].chars().all(|c| c.is_ascii_alphanumeric()) => {
                    &rest[newline + 1..]
                }
                _ => rest,
            };
            match rest.find("```") {
                Some(end) => &rest[..end],
                None => rest,
            }
        }
        None => trimmed,
    };
    body.trim().trim_matches('`').trim().to_string()
}

#[async_trait]
impl Tool for ComputeTool {
    fn name(&self) -> &str {
        "compute"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Evaluates a pipeline program over fetched data. Fetched records \
                are in 'shopify_data' (legacy alias 'orders_data' holds the same data). Stages: where, select, \
                sort_by, take, flatten, distinct, count, sum, avg, min, max, group_by, table, keys. \
                Use 'let name = ...' to keep a result for a later call."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("code", "The program to evaluate.", true)
                .build(),
        }
    }

    async fn invoke(&self, input: ParsedInput, scope: &mut ExecutionScope) -> Result<ToolOutput> {
        let program = Self::program(&input)?;
        tracing::debug!(target: "shoplens.tools", program = %program, "evaluating compute program");

        match evaluate_to_text(&program, scope) {
            Ok(text) => Ok(ToolOutput::Text(text)),
            Err(err) => {
                tracing::info!(target: "shoplens.tools", error = %err, "compute program failed");
                Ok(ToolOutput::Text(format!("Error: {}", err)))
            }
        }
    }
}
