// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Action parser
//!
//! Reads the text protocol the model writes:
//!
//! ```text
//! Action: get_shopify_data
//! Action Input: {"resource": "orders"}
//! ```
//!
//! or `Final Answer: ...`. Parsing never fails; text that matches neither
//! form yields [`ActionParse::None`].

use std::sync::OnceLock;

use regex::Regex;

use super::types::ToolInvocation;

pub const ACTION_MARKER: &str = "Action:";
pub const ACTION_INPUT_MARKER: &str = "Action Input:";
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";
pub const OBSERVATION_MARKER: &str = "Observation:";

/// Parsed model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionParse {
    /// Text after the last `Final Answer:` marker
    Terminal(String),
    /// A tool call
    Action(ToolInvocation),
    /// Neither marker found
    None,
}

fn action_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)Action:[ \t]*([^\r\n]*?)[ \t]*\r?\nAction Input:\s*(.*)").expect("action pattern is valid")
    })
}

fn fenced_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)^```(?:[A-Za-z0-9_+-]*[ \t]*\r?\n)?(.*?)(?:```|$)").expect("fence pattern is valid")
    })
}

/// Parse one model output.
pub fn parse_output(text: &str) -> ActionParse {
    if let Some((_, answer)) = text.rsplit_once(FINAL_ANSWER_MARKER) {
        return ActionParse::Terminal(answer.trim().to_string());
    }

    let Some(captures) = action_pattern().captures(text) else {
        return ActionParse::None;
    };

    let name = captures
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '`' || c == '[' || c == ']')
        .trim()
        .to_string();
    let raw = captures.get(2).map(|m| m.as_str()).unwrap_or_default();

    ActionParse::Action(ToolInvocation {
        name,
        input: clean_input(raw),
    })
}

/// Unwrap a fenced input, cut a leaked observation and strip backticks.
fn clean_input(raw: &str) -> String {
    let mut input = raw.trim();
    if let Some((before, _)) = input.split_once(OBSERVATION_MARKER) {
        input = before.trim();
    }
    if input.starts_with("```") {
        if let Some(body) = fenced_pattern().captures(input).and_then(|c| c.get(1)) {
            input = body.as_str().trim();
        }
    }
    input.trim_matches('`').trim().to_string()
}
