// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool definition types
//!
//! Schemas describe tool inputs; the catalogue renders them as prompt text
//! for a model without native function calling.

use serde_json::{json, Value};

use crate::llm::provider::{ToolDefinition, ToolInputSchema};

/// Helper to create a tool input schema
pub struct SchemaBuilder {
    properties: serde_json::Map<String, Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self {
            properties: serde_json::Map::new(),
            required: vec![],
        }
    }

    fn property(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Add a string property
    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "string", "description": description}),
            required,
        )
    }

    /// Add a string property restricted to `values`
    pub fn one_of(self, name: &str, description: &str, values: &[&str], required: bool) -> Self {
        self.property(
            name,
            json!({"type": "string", "description": description, "enum": values}),
            required,
        )
    }

    /// Add an integer property with inclusive bounds and a default
    pub fn bounded_integer(
        self,
        name: &str,
        description: &str,
        min: i64,
        max: i64,
        default: i64,
    ) -> Self {
        self.property(
            name,
            json!({
                "type": "integer",
                "description": description,
                "minimum": min,
                "maximum": max,
                "default": default
            }),
            false,
        )
    }

    /// Add a free-form object property
    pub fn object(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "object", "description": description}),
            required,
        )
    }

    /// Build the schema
    pub fn build(self) -> ToolInputSchema {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties: Value::Object(self.properties),
            required: self.required,
        }
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Render tool definitions as `name: description` lines followed by the
/// accepted arguments.
pub fn render_catalogue(definitions: &[ToolDefinition]) -> String {
    definitions
        .iter()
        .map(|def| {
            let args = match &def.input_schema.properties {
                Value::Object(props) if !props.is_empty() => {
                    let names: Vec<String> = props
                        .keys()
                        .map(|k| {
                            if def.input_schema.required.contains(k) {
                                k.clone()
                            } else {
                                format!("{}?", k)
                            }
                        })
                        .collect();
                    format!(" Arguments: {}.", names.join(", "))
                }
                _ => String::new(),
            };
            format!("{}: {}{}", def.name, def.description, args)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_builder_required_tracking() {
        let schema = SchemaBuilder::new()
            .one_of("resource", "Resource", &["orders", "products"], true)
            .bounded_integer("limit", "Page size", 1, 250, 50)
            .object("filters", "Query filters", false)
            .build();

        assert_eq!(schema.schema_type, "object");
        assert_eq!(schema.required, vec!["resource".to_string()]);
        assert_eq!(schema.properties["resource"]["enum"], json!(["orders", "products"]));
        assert_eq!(schema.properties["limit"]["maximum"], json!(250));
        assert_eq!(schema.properties["limit"]["default"], json!(50));
        assert_eq!(schema.properties["filters"]["type"], "object");
    }

    #[test]
    fn test_schema_builder_empty_build() {
        let schema = SchemaBuilder::default().build();
        assert!(schema.required.is_empty());
        assert_eq!(schema.properties, json!({}));
    }

    #[test]
    fn test_render_catalogue() {
        let defs = vec![
            ToolDefinition {
                name: "get_shopify_data".to_string(),
                description: "Fetch store records.".to_string(),
                input_schema: SchemaBuilder::new()
                    .string("resource", "Resource", true)
                    .bounded_integer("limit", "Page size", 1, 250, 50)
                    .build(),
            },
            ToolDefinition {
                name: "noop".to_string(),
                description: "Does nothing.".to_string(),
                input_schema: SchemaBuilder::new().build(),
            },
        ];

        let text = render_catalogue(&defs);
        assert_eq!(
            text,
            "get_shopify_data: Fetch store records. Arguments: limit?, resource.\nnoop: Does nothing."
        );
    }
}
