// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Shoplens - analytics assistant for Shopify stores.
//!
//! A store owner asks questions in plain language; the assistant decides
//! when to fetch store data and when to compute over it.
//!
//! Architecture highlights:
//! - `agent`: bounded reason/act loop over a text tool protocol
//! - `store`: paginated Admin API client with backoff and dedup
//! - `compute`: pipeline language evaluated against per-turn datasets
//! - `tools`: the data-fetch and compute tools the model can call
//! - `llm`: provider abstraction with an OpenAI-compatible implementation
//! - `chat`, `history`: session-aware service used by the CLI
//! - `resilience`: retry policy and token-bucket limiter

pub mod agent;
pub mod chat;
pub mod cli;
pub mod compute;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod resilience;
pub mod store;
pub mod tools;
pub mod utils;

pub use error::{Result, ShoplensError};
