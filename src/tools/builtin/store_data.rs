// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Store data tool
//!
//! Fetches orders, products or customers through a [`StoreClient`] built for
//! the single invocation and released before returning.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::compute::ExecutionScope;
use crate::config::Settings;
use crate::error::{Result, ShoplensError};
use crate::llm::provider::ToolDefinition;
use crate::resilience::TokenBucket;
use crate::store::{FetchParams, Resource, StoreClient, StoreClientConfig};
use crate::tools::{ParsedInput, SchemaBuilder, Tool, ToolOutput};
use crate::utils::validate_date_range;

/// Page size used when the model does not give one
pub const DEFAULT_TOOL_LIMIT: u32 = 50;

/// Largest page size the store accepts
pub const MAX_TOOL_LIMIT: u32 = 250;

/// Validated tool arguments
#[derive(Debug, Clone, PartialEq)]
pub struct StoreDataRequest {
    pub resource: String,
    pub limit: u32,
    pub filters: Map<String, Value>,
}

impl StoreDataRequest {
    /// Read arguments from decoded input. A bare string names the resource.
    pub fn from_input(input: &ParsedInput) -> Result<Self> {
        let map = match input {
            ParsedInput::Raw(text) => {
                return Ok(Self {
                    resource: text.trim().trim_matches(|c| c == '"' || c == '\'').to_string(),
                    limit: DEFAULT_TOOL_LIMIT,
                    filters: Map::new(),
                })
            }
            ParsedInput::Structured(map) => map,
        };

        let resource = map
            .get("resource")
            .and_then(Value::as_str)
            .ok_or_else(|| ShoplensError::ToolExecution("resource is required".to_string()))?
            .to_string();

        let limit = match map.get("limit") {
            None | Some(Value::Null) => DEFAULT_TOOL_LIMIT as i64,
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| limit_error(&n.to_string()))?,
            Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| limit_error(s))?,
            Some(other) => return Err(limit_error(&other.to_string())),
        };
        if !(1..=MAX_TOOL_LIMIT as i64).contains(&limit) {
            return Err(limit_error(&limit.to_string()));
        }

        let filters = match map.get("filters") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(filters)) => filters.clone(),
            Some(_) => {
                return Err(ShoplensError::ToolExecution(
                    "filters must be an object of query parameters".to_string(),
                ))
            }
        };
        check_created_range(&filters)?;

        Ok(Self {
            resource,
            limit: limit as u32,
            filters,
        })
    }
}

/// Reject a `created_at_min`/`created_at_max` pair that is malformed or inverted.
fn check_created_range(filters: &Map<String, Value>) -> Result<()> {
    let bound = |key: &str| filters.get(key).and_then(Value::as_str);
    let (Some(min), Some(max)) = (bound("created_at_min"), bound("created_at_max")) else {
        return Ok(());
    };
    match validate_date_range(min, max) {
        Ok(true) => Ok(()),
        Ok(false) => Err(ShoplensError::ToolExecution(format!(
            "created_at_min ({}) is after created_at_max ({})",
            min, max
        ))),
        Err(ShoplensError::Validation(message)) => Err(ShoplensError::ToolExecution(message)),
        Err(err) => Err(err),
    }
}

fn limit_error(value: &str) -> ShoplensError {
    ShoplensError::ToolExecution(format!(
        "limit must be an integer between 1 and {}, got {}",
        MAX_TOOL_LIMIT, value
    ))
}

/// Tool that fetches store records
pub struct StoreDataTool {
    settings: Arc<Settings>,
    limiter: Option<Arc<TokenBucket>>,
}

impl StoreDataTool {
    pub fn new(settings: Arc<Settings>, limiter: Option<Arc<TokenBucket>>) -> Self {
        Self { settings, limiter }
    }

    async fn fetch(&self, resource: Resource, params: FetchParams) -> Result<Vec<Value>> {
        let config = StoreClientConfig::from_settings(&self.settings)?;
        let client = StoreClient::new(config, self.limiter.clone())?;
        let result = client
            .fetch(resource, params, self.settings.store.max_pages)
            .await;
        client.close();
        result
    }
}

#[async_trait]
impl Tool for StoreDataTool {
    fn name(&self) -> &str {
        "get_shopify_data"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Useful for retrieving data from a Shopify store. \
                Inputs: resource (orders/products/customers), limit (max 250), filters (dict). \
                Returns a list of records."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .one_of(
                    "resource",
                    "The resource to fetch.",
                    &["orders", "products", "customers"],
                    true,
                )
                .bounded_integer(
                    "limit",
                    "Number of results to return per page.",
                    1,
                    MAX_TOOL_LIMIT as i64,
                    DEFAULT_TOOL_LIMIT as i64,
                )
                .object(
                    "filters",
                    "Query parameters, e.g. {\"created_at_min\": \"2025-12-14T00:00:00Z\"}.",
                    false,
                )
                .build(),
        }
    }

    async fn invoke(&self, input: ParsedInput, _scope: &mut ExecutionScope) -> Result<ToolOutput> {
        let request = StoreDataRequest::from_input(&input)?;

        let resource = match request.resource.parse::<Resource>() {
            Ok(resource) => resource,
            Err(_) => {
                return Ok(ToolOutput::Text(format!(
                    "Error: Resource '{}' is not supported. Allowed: {}",
                    request.resource,
                    Resource::allowed_list()
                )))
            }
        };

        let mut params = FetchParams::from_filters(&request.filters);
        params.set("limit", request.limit.to_string());

        tracing::info!(
            target: "shoplens.tools",
            resource = %resource,
            limit = request.limit,
            filters = params.len().saturating_sub(1),
            "fetching store data"
        );

        match self.fetch(resource, params).await {
            Ok(records) => Ok(ToolOutput::Records(records)),
            Err(ShoplensError::Store(err)) if err.is_fatal() => Err(err.into()),
            Err(ShoplensError::Store(err)) => Ok(ToolOutput::Text(format!("Shopify Error: {}", err))),
            Err(err) => Ok(ToolOutput::Text(format!("Unexpected Error: {}", err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server_uri: Option<&str>) -> Arc<Settings> {
        let mut settings = Settings::default();
        settings.store.access_token_env = "SHOPLENS_TEST_UNSET_STORE_TOKEN".to_string();
        settings.store.access_token = Some("shpat_test".to_string());
        settings.store.base_url = server_uri.map(|uri| format!("{}/admin/api/2025-07", uri));
        settings.store.store_url = "demo.myshopify.com".to_string();
        Arc::new(settings)
    }

    fn structured(value: Value) -> ParsedInput {
        match value {
            Value::Object(map) => ParsedInput::Structured(map),
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_request_defaults() {
        let request = StoreDataRequest::from_input(&structured(json!({"resource": "orders"}))).unwrap();
        assert_eq!(request.limit, 50);
        assert!(request.filters.is_empty());
    }

    #[test]
    fn test_request_raw_string_is_resource() {
        let request = StoreDataRequest::from_input(&ParsedInput::Raw("'products'".into())).unwrap();
        assert_eq!(request.resource, "products");
        assert_eq!(request.limit, 50);
    }

    #[test]
    fn test_request_limit_bounds() {
        for bad in [json!(0), json!(251), json!("many"), json!(true)] {
            let input = structured(json!({"resource": "orders", "limit": bad}));
            assert!(StoreDataRequest::from_input(&input).is_err());
        }
        let input = structured(json!({"resource": "orders", "limit": "250"}));
        assert_eq!(StoreDataRequest::from_input(&input).unwrap().limit, 250);
    }

    #[test]
    fn test_request_requires_resource() {
        let err = StoreDataRequest::from_input(&structured(json!({"limit": 5}))).unwrap_err();
        assert!(err.to_string().contains("resource is required"));
    }

    #[test]
    fn test_request_checks_created_range() {
        let ok = structured(json!({"resource": "orders", "filters": {
            "created_at_min": "2025-01-01", "created_at_max": "2025-01-31T23:59:59Z"
        }}));
        assert!(StoreDataRequest::from_input(&ok).is_ok());

        let inverted = structured(json!({"resource": "orders", "filters": {
            "created_at_min": "2025-02-01", "created_at_max": "2025-01-01"
        }}));
        let err = StoreDataRequest::from_input(&inverted).unwrap_err();
        assert!(err.to_string().contains("is after created_at_max"));

        let garbage = structured(json!({"resource": "orders", "filters": {
            "created_at_min": "last week", "created_at_max": "2025-01-01"
        }}));
        let err = StoreDataRequest::from_input(&garbage).unwrap_err();
        assert!(err.to_string().contains("Invalid date format. Use ISO 8601."));

        let one_sided = structured(json!({"resource": "orders", "filters": {"created_at_min": "soon"}}));
        assert!(StoreDataRequest::from_input(&one_sided).is_ok());
    }

    #[tokio::test]
    async fn test_network_failure_is_tagged_text() {
        let mut settings = Settings::default();
        settings.store.access_token_env = "SHOPLENS_TEST_UNSET_STORE_TOKEN".to_string();
        settings.store.access_token = Some("shpat_test".to_string());
        settings.store.store_url = "demo.myshopify.com".to_string();
        settings.store.base_url = Some("http://127.0.0.1:1/admin/api/2025-07".to_string());
        let tool = StoreDataTool::new(Arc::new(settings), None);
        let mut scope = ExecutionScope::new();

        let output = tool
            .invoke(structured(json!({"resource": "orders"})), &mut scope)
            .await
            .unwrap();
        match output {
            ToolOutput::Text(text) => {
                assert!(text.starts_with("Shopify Error: Network Error"), "{}", text)
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsupported_resource_is_tagged_text() {
        let tool = StoreDataTool::new(settings_for(None), None);
        let mut scope = ExecutionScope::new();
        let output = tool
            .invoke(structured(json!({"resource": "inventory"})), &mut scope)
            .await
            .unwrap();
        assert_eq!(
            output,
            ToolOutput::Text(
                "Error: Resource 'inventory' is not supported. Allowed: orders, products, customers"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_fetch_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/api/2025-07/products.json"))
            .and(header("X-Shopify-Access-Token", "shpat_test"))
            .and(query_param("limit", "10"))
            .and(query_param("vendor", "Acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "products": [{"id": 1, "title": "Mug"}, {"id": 2, "title": "Cap"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool = StoreDataTool::new(settings_for(Some(&server.uri())), None);
        let mut scope = ExecutionScope::new();
        let output = tool
            .invoke(
                structured(json!({"resource": "products", "limit": 10, "filters": {"vendor": "Acme"}})),
                &mut scope,
            )
            .await
            .unwrap();

        match output {
            ToolOutput::Records(records) => assert_eq!(records.len(), 2),
            other => panic!("expected records, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upstream_error_is_tagged_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let tool = StoreDataTool::new(settings_for(Some(&server.uri())), None);
        let mut scope = ExecutionScope::new();
        let output = tool
            .invoke(structured(json!({"resource": "customers"})), &mut scope)
            .await
            .unwrap();
        assert_eq!(
            output,
            ToolOutput::Text("Shopify Error: HTTP Error (500): boom".to_string())
        );
    }

    #[tokio::test]
    async fn test_auth_error_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .expect(1)
            .mount(&server)
            .await;

        let tool = StoreDataTool::new(settings_for(Some(&server.uri())), None);
        let mut scope = ExecutionScope::new();
        let err = tool
            .invoke(structured(json!({"resource": "orders"})), &mut scope)
            .await
            .unwrap_err();
        assert!(err.is_fatal_for_turn());
    }

    #[tokio::test]
    async fn test_missing_token_is_unexpected_error() {
        let mut settings = Settings::default();
        settings.store.access_token_env = "SHOPLENS_TEST_UNSET_STORE_TOKEN".to_string();
        settings.store.store_url = "demo.myshopify.com".to_string();
        let tool = StoreDataTool::new(Arc::new(settings), None);
        let mut scope = ExecutionScope::new();

        let output = tool
            .invoke(ParsedInput::Raw("orders".into()), &mut scope)
            .await
            .unwrap();
        match output {
            ToolOutput::Text(text) => assert!(text.starts_with("Unexpected Error:")),
            other => panic!("expected text, got {:?}", other),
        }
    }
}
