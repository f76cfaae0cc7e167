// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Utility functions for Shoplens
//!
//! Input validators and text helpers shared by the agent, the chat service
//! and the CLI.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::error::{ShoplensError, StoreError};

/// Default maximum length for sanitized input
pub const DEFAULT_SANITIZE_MAX_LEN: usize = 1000;

/// Marker appended to truncated observations
pub const TRUNCATION_MARKER: &str = "\n... [Output Truncated]";

fn store_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https?://[\w\-]+(\.[\w\-]+)+[/#?]?.*$").expect("store URL pattern is valid")
    })
}

fn code_fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```.*?```").expect("code fence pattern is valid"))
}

/// Check that a store URL is an absolute http(s) URL with a dotted host.
pub fn validate_store_url(url: &str) -> bool {
    store_url_pattern().is_match(url)
}

/// Escape the five HTML-significant characters.
pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// HTML-escape `input` and cut it to `max_len` characters.
pub fn sanitize_input(input: &str, max_len: usize) -> String {
    truncate_chars(&html_escape(input), max_len).to_string()
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Cut `text` to `max_chars` characters, appending the truncation marker
/// when anything was removed.
pub fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    let head = truncate_chars(text, max_chars);
    if head.len() == text.len() {
        text.to_string()
    } else {
        format!("{}{}", head, TRUNCATION_MARKER)
    }
}

/// Remove every fenced code block from `text`.
pub fn strip_code_fences(text: &str) -> String {
    code_fence_pattern().replace_all(text, "").trim().to_string()
}

/// Parse an ISO 8601 timestamp. A trailing `Z` is accepted, as are naive
/// date-times and bare dates (taken as UTC).
pub fn parse_iso8601(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    let utc = FixedOffset::east_opt(0)?;
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.and_local_timezone(utc).single();
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0)?.and_local_timezone(utc).single();
    }
    None
}

/// Whether `start` is not after `end`. Fails when either is not ISO 8601.
pub fn validate_date_range(start: &str, end: &str) -> Result<bool, ShoplensError> {
    match (parse_iso8601(start), parse_iso8601(end)) {
        (Some(start), Some(end)) => Ok(start <= end),
        _ => Err(ShoplensError::Validation(
            "Invalid date format. Use ISO 8601.".to_string(),
        )),
    }
}

/// Format an error for display in the terminal
pub fn format_error(error: &ShoplensError) -> String {
    match error {
        ShoplensError::Store(StoreError::Auth(_)) => {
            "Store authentication failed. Check your access token.".to_string()
        }
        ShoplensError::Config(message) => format!("Configuration error: {}", message),
        _ => format!("Error: {}", error),
    }
}

/// Parse a session ID, supporting both short and full UUID forms
pub fn parse_session_id(session_id: &str) -> Result<String, ShoplensError> {
    if session_id.is_empty() {
        return Err(ShoplensError::Validation(
            "Session ID cannot be empty".to_string(),
        ));
    }

    if session_id.len() <= 8 {
        if session_id.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Ok(session_id.to_string());
        }
        return Err(ShoplensError::Validation(
            "Invalid session ID: must be hexadecimal".to_string(),
        ));
    }

    uuid::Uuid::parse_str(session_id)
        .map(|u| u.to_string())
        .map_err(|_| ShoplensError::Validation("Invalid session ID format".to_string()))
}

/// Check if a command is an exit command
pub fn is_exit_command(input: &str) -> bool {
    let trimmed = input.trim().to_lowercase();
    matches!(trimmed.as_str(), "exit" | "quit" | "/exit" | "/quit")
}
