// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Resilient paginated access to the Shopify Admin REST API.

pub mod client;
pub mod pagination;
pub mod resource;

pub use client::{StoreClient, StoreClientConfig};
pub use pagination::{dedup_by_id, next_link, FetchPage};
pub use resource::{FetchParams, Resource, DEFAULT_PAGE_LIMIT};
