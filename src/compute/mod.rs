// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Compute language
//!
//! A small pipeline language the model uses to analyse datasets held in the
//! turn's [`ExecutionScope`]:
//!
//! ```text
//! let items = shopify_data | flatten line_items
//! items | group_by title sum quantity | take 5 | table
//! ```
//!
//! Programs read and write only the scope they are given.

pub mod eval;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod scope;

use serde_json::Value;
use thiserror::Error;

pub use render::{format_number, markdown_table, render_value};
pub use scope::ExecutionScope;

/// Errors raised while parsing or evaluating a compute program
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("name '{name}' is not defined (available: {available})")]
    UnknownVariable { name: String, available: String },

    #[error("type error: {0}")]
    Type(String),

    #[error("no statements to evaluate")]
    Empty,

    #[error("out of range: {0}")]
    Range(String),
}

/// Parse and run `source` against `scope`, returning the value of the last
/// statement.
pub fn evaluate(source: &str, scope: &mut ExecutionScope) -> Result<Value, ComputeError> {
    let statements = parser::parse(source)?;
    eval::execute(&statements, scope)
}

/// Evaluate and render the result as observation text.
pub fn evaluate_to_text(source: &str, scope: &mut ExecutionScope) -> Result<String, ComputeError> {
    let value = evaluate(source, scope)?;
    Ok(render_value(&value))
}
