// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat service
//!
//! Validates a user message, runs a turn with the session's recent history,
//! records both sides of the exchange, and turns turn-ending errors into
//! messages a store owner can act on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::agent::ConversationTurn;
use crate::error::{Result, ShoplensError, StoreError};
use crate::history::{Conversation, ConversationLog, StoredMessage};
use crate::llm::message::Role;
use crate::utils::{parse_session_id, sanitize_input, DEFAULT_SANITIZE_MAX_LEN};

use super::context::AppContext;

/// Longest accepted user message, in characters
pub const MAX_MESSAGE_CHARS: usize = 500;

pub const STORE_TROUBLE_MESSAGE: &str =
    "I'm having trouble connecting to your store. Please try again later.";
pub const OVERLOAD_MESSAGE: &str = "**System Overload**: I am currently receiving too many requests. Please wait 30-60 seconds and try again.";

/// Reply to one user message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub session_id: Uuid,
    pub message: String,
    /// The turn's scratchpad, when transcripts are enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_process: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Check length and escape a user message.
pub fn validate_message(message: &str) -> Result<String> {
    let length = message.chars().count();
    if message.trim().is_empty() {
        return Err(ShoplensError::Validation(
            "message must not be empty".to_string(),
        ));
    }
    if length > MAX_MESSAGE_CHARS {
        return Err(ShoplensError::Validation(format!(
            "message is {} characters; the limit is {}",
            length, MAX_MESSAGE_CHARS
        )));
    }
    Ok(sanitize_input(message.trim(), DEFAULT_SANITIZE_MAX_LEN))
}

/// Text shown to the user for an error that ended a turn.
pub fn user_facing_error(err: &ShoplensError) -> String {
    if err.is_model_rate_limit() {
        return OVERLOAD_MESSAGE.to_string();
    }
    match err {
        ShoplensError::Store(StoreError::Auth(_) | StoreError::RateLimited { .. }) => {
            STORE_TROUBLE_MESSAGE.to_string()
        }
        other => format!("I encountered an error: {}", other),
    }
}

/// Sessions plus the assistant, behind one entry point
pub struct ChatService {
    context: Arc<AppContext>,
    log: Mutex<ConversationLog>,
}

impl ChatService {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self {
            context,
            log: Mutex::new(ConversationLog::new()),
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Open a session for the configured store.
    pub async fn start_session(&self) -> Result<Uuid> {
        self.log.lock().await.create_session(&self.context.store_url())
    }

    /// Handle one user message.
    ///
    /// Fails only for invalid input or an unknown session; errors raised
    /// during the turn become the reply text.
    pub async fn send(&self, session_id: Uuid, message: &str) -> Result<ChatReply> {
        let message = validate_message(message)?;

        let history = {
            let mut log = self.log.lock().await;
            let history = log.recent(session_id, self.context.settings.agent.history_window)?;
            log.append(session_id, Role::User, &message)?;
            history
        };

        let turn = ConversationTurn::new(session_id.to_string(), message).with_history(history);
        let (answer, thought_process) = match self.context.runner().run_turn(&turn).await {
            Ok(result) => (result.answer, result.transcript),
            Err(err) => {
                tracing::error!(
                    target: "shoplens.agent.loop",
                    session_id = %session_id,
                    error = %err,
                    "turn failed"
                );
                (user_facing_error(&err), None)
            }
        };

        let stored = self
            .log
            .lock()
            .await
            .append(session_id, Role::Assistant, &answer)?;

        Ok(ChatReply {
            session_id,
            message: answer,
            thought_process,
            timestamp: stored.timestamp,
        })
    }

    /// All messages of a session
    pub async fn history(&self, session_id: Uuid) -> Result<Vec<StoredMessage>> {
        Ok(self.log.lock().await.history(session_id)?.to_vec())
    }

    /// Sessions by last activity
    pub async fn sessions(&self, limit: usize) -> Vec<Conversation> {
        self.log
            .lock()
            .await
            .list_recent(limit)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Sessions whose summary mentions `query`
    pub async fn search_sessions(&self, query: &str) -> Vec<Conversation> {
        self.log
            .lock()
            .await
            .search(query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Resolve a full session ID or a unique short prefix.
    pub async fn resolve_session(&self, id_or_prefix: &str) -> Result<Uuid> {
        let id_or_prefix = parse_session_id(id_or_prefix.trim())?;
        self.log
            .lock()
            .await
            .resolve(&id_or_prefix)
            .ok_or_else(|| ShoplensError::Session(format!("no single session matches '{}'", id_or_prefix)))
    }

    pub async fn delete_session(&self, session_id: Uuid) -> bool {
        self.log.lock().await.delete(session_id)
    }
}
