// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat surface: application context, session-aware chat service and
//! terminal formatting.

pub mod context;
pub mod display;
pub mod service;

pub use context::AppContext;
pub use service::{user_facing_error, validate_message, ChatReply, ChatService};
