// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Shopify Admin REST client
//!
//! Fetches every page of a resource by following `Link: <...>; rel="next"`
//! headers, retries throttled requests with exponential backoff, and returns
//! the records deduplicated by id.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, LINK};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::config::Settings;
use crate::error::{Result, ShoplensError, StoreError};
use crate::resilience::{with_retry, RetryPolicy, TokenBucket};

use super::pagination::{dedup_by_id, next_link, FetchPage};
use super::resource::{FetchParams, Resource};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Connection settings for a [`StoreClient`]
#[derive(Debug, Clone)]
pub struct StoreClientConfig {
    /// `https://{store}/admin/api/{version}`
    pub base_url: String,
    pub access_token: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl StoreClientConfig {
    /// Resolve connection settings, failing when no access token is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let access_token = settings.get_store_access_token().ok_or_else(|| {
            ShoplensError::Config(format!(
                "no store access token; set {}",
                settings.store.access_token_env
            ))
        })?;

        let mut store = settings.store.clone();
        store.store_url = settings.get_store_url();
        if store.store_url.is_empty() && store.base_url.is_none() {
            return Err(ShoplensError::Config(
                "no store URL; set store.store_url or SHOPIFY_STORE_URL".to_string(),
            ));
        }

        Ok(Self {
            base_url: store.api_base_url(),
            access_token,
            timeout: Duration::from_secs(settings.store.request_timeout_secs),
            retry: RetryPolicy::from(&settings.resilience),
        })
    }
}

/// Async client for one fetch session
///
/// Built per tool invocation; dropping it (or calling [`StoreClient::close`])
/// releases its connections.
pub struct StoreClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
    limiter: Option<Arc<TokenBucket>>,
}

impl StoreClient {
    /// Create a client with the credential installed as a default header.
    pub fn new(config: StoreClientConfig, limiter: Option<Arc<TokenBucket>>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&config.access_token)
            .map_err(|_| ShoplensError::Config("access token is not a valid header".to_string()))?;
        headers.insert(ACCESS_TOKEN_HEADER, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
            limiter,
        })
    }

    /// URL of the first page of a resource
    pub fn resource_url(&self, resource: Resource) -> String {
        format!("{}/{}.json", self.base_url, resource.as_str())
    }

    /// Fetch up to `max_pages` pages of `resource` and deduplicate by id.
    pub async fn fetch(
        &self,
        resource: Resource,
        params: FetchParams,
        max_pages: u32,
    ) -> Result<Vec<Value>> {
        let params = params.normalized_for(resource);
        let mut all_records = Vec::new();
        let mut current_url = Some(self.resource_url(resource));
        let mut page_count: u32 = 0;

        while let Some(url) = current_url.take() {
            if page_count >= max_pages {
                tracing::info!(
                    target: "shoplens.store.client",
                    resource = %resource,
                    max_pages,
                    "page cap reached; stopping pagination"
                );
                break;
            }
            page_count += 1;
            tracing::info!(
                target: "shoplens.store.client",
                resource = %resource,
                page = page_count,
                "fetching page"
            );

            // Continuation URLs carry their own query string.
            let page_params = (page_count == 1).then_some(&params);
            let page = self.fetch_page(resource, &url, page_params).await?;

            all_records.extend(page.records);
            match &page.next {
                Some(next) => tracing::debug!(
                    target: "shoplens.store.client",
                    next = %next,
                    "found next page link"
                ),
                None => tracing::debug!(target: "shoplens.store.client", "no next page link"),
            }
            current_url = page.next;
        }

        let raw_count = all_records.len();
        let deduped = dedup_by_id(all_records);
        tracing::info!(
            target: "shoplens.store.client",
            resource = %resource,
            pages = page_count,
            raw = raw_count,
            unique = deduped.len(),
            "fetch complete"
        );
        Ok(deduped)
    }

    /// Fetch one page, retrying throttled attempts.
    async fn fetch_page(
        &self,
        resource: Resource,
        url: &str,
        params: Option<&FetchParams>,
    ) -> Result<FetchPage> {
        let response = with_retry(
            |attempt| self.send_once(url, params, attempt),
            &self.retry,
            resource.as_str(),
        )
        .await?;

        let next = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(next_link);

        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

        let records = match body.get(resource.as_str()) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Object(_)) => vec![body[resource.as_str()].clone()],
            _ => {
                tracing::warn!(
                    target: "shoplens.store.client",
                    resource = %resource,
                    "unexpected response structure; no records extracted"
                );
                Vec::new()
            }
        };

        Ok(FetchPage { records, next })
    }

    /// Issue a single GET and classify the status.
    async fn send_once(
        &self,
        url: &str,
        params: Option<&FetchParams>,
        attempt: u32,
    ) -> Result<reqwest::Response> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire(1).await?;
        }

        let mut request = self.http.get(url);
        if let Some(params) = params {
            let query: Vec<(&String, &String)> = params.iter().collect();
            request = request.query(&query);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(target: "shoplens.store.client", error = %e, "network error");
            let message = if e.is_timeout() {
                format!("request timed out: {}", e)
            } else {
                e.to_string()
            };
            ShoplensError::Store(StoreError::Network(message))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::Auth(body).into())
            }
            StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!(
                    target: "shoplens.store.client",
                    attempt,
                    "store rate limit hit"
                );
                Err(StoreError::RateLimited { attempts: attempt }.into())
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    target: "shoplens.store.client",
                    status = status.as_u16(),
                    "upstream error"
                );
                Err(StoreError::Upstream {
                    status: status.as_u16(),
                    message: body,
                }
                .into())
            }
        }
    }

    /// Release the client's connection pool.
    pub fn close(self) {
        tracing::debug!(target: "shoplens.store.client", "store client closed");
        drop(self);
    }
}
