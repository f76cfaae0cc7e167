// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in tools for Shoplens

mod compute;
mod store_data;

pub use compute::ComputeTool;
pub use store_data::{StoreDataRequest, StoreDataTool, DEFAULT_TOOL_LIMIT, MAX_TOOL_LIMIT};
