// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Core types for a single assistant turn

use serde::{Deserialize, Serialize};

use crate::error::ShoplensError;
use crate::llm::message::Message;

/// Input to one run of the orchestration loop
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    /// Session the turn belongs to
    pub session_id: String,
    /// The new user message
    pub message: String,
    /// Prior messages, oldest first; only the configured window is used
    pub history: Vec<Message>,
}

impl ConversationTurn {
    /// Create a turn without history
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            history: Vec::new(),
        }
    }

    /// Attach prior messages
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}

/// A model-requested tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Action name as written by the model
    pub name: String,
    /// Raw action input text
    pub input: String,
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The model produced an answer
    Answered,
    /// The iteration bound was reached first
    Exhausted,
    /// The message was refused before the loop started
    Refused,
}

/// Result of a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    /// Text returned to the user
    pub answer: String,
    /// The scratchpad, when transcripts are enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    pub status: TurnStatus,
    /// Model calls made
    pub iterations: usize,
    /// Tool invocations made (unknown tools excluded)
    pub tool_calls: usize,
}

/// Outcome of one reason/act iteration
#[derive(Debug)]
pub enum StepOutcome {
    /// A tool ran (or was rejected); the observation goes to the scratchpad
    Continue(String),
    /// The turn has an answer
    Answered(String),
    /// An error that ends the turn
    Error(ShoplensError),
}
