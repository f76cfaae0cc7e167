// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation history for Shoplens sessions
//!
//! Sessions live for the life of the process; nothing is written to disk.

pub mod store;

pub use store::{Conversation, ConversationLog, StoredMessage};
