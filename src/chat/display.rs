// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Display formatting for the terminal
//!
//! Functions return formatted strings rather than writing directly to
//! stdout, making them easy to test.

use serde_json::Value;

use crate::history::{Conversation, StoredMessage};
use crate::llm::message::Role;
use crate::utils::truncate_chars;

/// Truncate a string to max length with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", truncate_chars(s, max_len.saturating_sub(3)))
    }
}

/// Format welcome message
pub fn format_welcome(provider_name: &str, model: &str, store_url: &str, session_id: &str) -> String {
    let mut output = String::new();
    output.push_str("Shoplens - analytics assistant for your store\n");
    output.push_str(&format!("Provider: {} | Model: {}\n", provider_name, model));
    output.push_str(&format!("Store: {}\n", store_url));
    output.push_str(&format!(
        "Session: {}\n",
        &session_id[..8.min(session_id.len())]
    ));
    output.push_str("\nAsk a question, /history to review the conversation, /exit to quit.\n");
    output.push_str("/sessions [query] lists sessions, /switch <id> and /delete <id> manage them.\n");
    output
}

/// Format one history entry
pub fn format_history_entry(message: &StoredMessage) -> String {
    let speaker = match message.role {
        Role::User => "You",
        Role::Assistant => "Shoplens",
        Role::System => "System",
    };
    format!(
        "[{}] {}: {}",
        message.timestamp.format("%H:%M:%S"),
        speaker,
        message.content
    )
}

/// Format a session for list display
pub fn format_session_item(conversation: &Conversation, is_current: bool) -> String {
    let id = conversation.id.to_string();
    format!(
        "{} {} {} ({} messages) {}",
        if is_current { "*" } else { " " },
        &id[..8],
        conversation.last_active.format("%Y-%m-%d %H:%M"),
        conversation.message_count(),
        truncate_string(conversation.summary.as_deref().unwrap_or("(no summary)"), 40)
    )
}

/// Summarise a direct fetch: record count and the field names of the first
/// record.
pub fn format_fetch_summary(resource: &str, records: &[Value]) -> String {
    let mut output = format!("Fetched {} {}\n", records.len(), resource);
    match records.first() {
        Some(Value::Object(first)) => {
            let keys: Vec<&str> = first.keys().map(String::as_str).collect();
            output.push_str(&format!("Fields: {}\n", keys.join(", ")));
        }
        Some(_) => output.push_str("Records are not objects\n"),
        None => {}
    }
    output
}
