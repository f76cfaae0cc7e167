// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Store resources and request parameters

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::ShoplensError;

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_LIMIT: u32 = 250;

/// Resources the assistant may read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Orders,
    Products,
    Customers,
}

impl Resource {
    /// Every readable resource, in catalogue order
    pub const ALL: [Resource; 3] = [Resource::Orders, Resource::Products, Resource::Customers];

    /// Path segment and envelope key
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Orders => "orders",
            Resource::Products => "products",
            Resource::Customers => "customers",
        }
    }

    /// Comma-separated list of supported names, for error messages
    pub fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = ShoplensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "orders" => Ok(Resource::Orders),
            "products" => Ok(Resource::Products),
            "customers" => Ok(Resource::Customers),
            other => Err(ShoplensError::Validation(format!(
                "Resource '{}' is not supported. Allowed: {}",
                other,
                Resource::allowed_list()
            ))),
        }
    }
}

/// Query parameters for the first page of a fetch
///
/// Keys are kept sorted so requests are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchParams {
    params: BTreeMap<String, String>,
}

impl FetchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.params.iter()
    }

    /// Build params from a JSON filter mapping supplied by the model.
    ///
    /// Scalars are rendered as text, arrays are comma-joined and nulls dropped.
    pub fn from_filters(filters: &serde_json::Map<String, Value>) -> Self {
        let mut params = Self::new();
        for (key, value) in filters {
            if let Some(rendered) = render_param(value) {
                params.set(key.clone(), rendered);
            }
        }
        params
    }

    /// Apply fetch defaults: page size, and `status=any` for orders so that
    /// closed and cancelled orders are counted.
    pub fn normalized_for(mut self, resource: Resource) -> Self {
        if !self.contains("limit") {
            self.set("limit", DEFAULT_PAGE_LIMIT.to_string());
        }
        if resource == Resource::Orders && !self.contains("status") {
            tracing::info!(
                target: "shoplens.store.client",
                "enforcing status=any for orders"
            );
            self.set("status", "any");
        }
        self
    }
}

fn render_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(render_param)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}
