// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Agentic orchestration loop
//!
//! A turn is a bounded reason/act loop over a text protocol. The model either
//! asks for a tool (`Action:` / `Action Input:`) or answers (`Final Answer:`).
//! Each turn gets its own tool registry, execution scope and scratchpad.

pub mod parser;
pub mod prompt;
pub mod runner;
pub mod types;

pub use parser::{parse_output, ActionParse};
pub use prompt::{PromptBuilder, Scratchpad, POLICY};
pub use runner::{
    dataset_summary, is_prompt_injection, prepare_order, AgentRunner, EXHAUSTED_MESSAGE,
    REFUSAL_MESSAGE, UNSURE_MESSAGE,
};
pub use types::{ConversationTurn, StepOutcome, ToolInvocation, TurnResult, TurnStatus};
