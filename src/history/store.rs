// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! In-memory conversation log
//!
//! Each conversation owns its ordered messages; a message only records the
//! id of the conversation it belongs to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ShoplensError};
use crate::llm::message::{Message, Role};
use crate::utils::{truncate_chars, validate_store_url};

/// Maximum characters kept in a conversation summary
const SUMMARY_MAX_CHARS: usize = 100;

/// A message recorded in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl StoredMessage {
    /// As a model message
    pub fn to_message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A conversation with one store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub store_url: String,
    pub started_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    /// First user message, shortened
    pub summary: Option<String>,
    messages: Vec<StoredMessage>,
}

impl Conversation {
    fn new(store_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            store_url: store_url.into(),
            started_at: now,
            last_active: now,
            summary: None,
            messages: Vec::new(),
        }
    }

    /// Messages in the order they were appended
    pub fn messages(&self) -> &[StoredMessage] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Update the last active timestamp
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// Set the summary, shortened to 100 characters
    pub fn set_summary(&mut self, summary: &str) {
        let head = truncate_chars(summary, SUMMARY_MAX_CHARS - 3);
        self.summary = Some(if head.len() < summary.len() {
            format!("{}...", head)
        } else {
            summary.to_string()
        });
    }
}

/// Conversations held for the life of the process
#[derive(Debug, Default)]
pub struct ConversationLog {
    conversations: Vec<Conversation>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation for a store, validating its URL.
    pub fn create_session(&mut self, store_url: &str) -> Result<Uuid> {
        if !validate_store_url(store_url) {
            return Err(ShoplensError::Validation(
                "Invalid store URL format".to_string(),
            ));
        }
        let conversation = Conversation::new(store_url);
        let id = conversation.id;
        tracing::debug!(target: "shoplens.history", session_id = %id, "session created");
        self.conversations.push(conversation);
        Ok(id)
    }

    /// Get a conversation by ID
    pub fn get(&self, id: Uuid) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Find a conversation by full id or by a unique id prefix.
    pub fn resolve(&self, id_or_prefix: &str) -> Option<Uuid> {
        if let Ok(id) = Uuid::parse_str(id_or_prefix) {
            return self.get(id).map(|c| c.id);
        }
        let mut matches = self
            .conversations
            .iter()
            .filter(|c| c.id.to_string().starts_with(id_or_prefix));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Some(only.id),
            _ => None,
        }
    }

    /// Append a message, returning a copy of what was stored.
    pub fn append(&mut self, id: Uuid, role: Role, content: &str) -> Result<StoredMessage> {
        let conversation = self
            .conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ShoplensError::Session(format!("session {} not found", id)))?;

        if role == Role::User && conversation.summary.is_none() {
            conversation.set_summary(content);
        }
        let message = StoredMessage {
            id: Uuid::new_v4(),
            conversation_id: id,
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        conversation.messages.push(message.clone());
        conversation.touch();
        Ok(message)
    }

    /// Every message of a conversation, oldest first
    pub fn history(&self, id: Uuid) -> Result<&[StoredMessage]> {
        self.get(id)
            .map(Conversation::messages)
            .ok_or_else(|| ShoplensError::Session(format!("session {} not found", id)))
    }

    /// The last `n` messages of a conversation as model messages
    pub fn recent(&self, id: Uuid, n: usize) -> Result<Vec<Message>> {
        let messages = self.history(id)?;
        let start = messages.len().saturating_sub(n);
        Ok(messages[start..].iter().map(StoredMessage::to_message).collect())
    }

    /// Conversations by last activity, most recent first
    pub fn list_recent(&self, limit: usize) -> Vec<&Conversation> {
        let mut sorted: Vec<_> = self.conversations.iter().collect();
        sorted.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        sorted.into_iter().take(limit).collect()
    }

    /// Search conversations by summary content
    pub fn search(&self, query: &str) -> Vec<&Conversation> {
        let query_lower = query.to_lowercase();
        self.conversations
            .iter()
            .filter(|c| {
                c.summary
                    .as_ref()
                    .map(|s| s.to_lowercase().contains(&query_lower))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Delete a conversation and its messages
    pub fn delete(&mut self, id: Uuid) -> bool {
        let initial_len = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        self.conversations.len() < initial_len
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
