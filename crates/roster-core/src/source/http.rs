//! HTTP list endpoint source.
//!
//! Issues `GET <url>?page=..&limit=..&search=..&<filter>=..` and expects
//! either `{ "data": [...], "pagination": {...} }` or a bare JSON array.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::json::display_value;
use crate::source::common::{create_http_client, handle_http_error, validate_url};
use crate::source::{PageRequest, PageResponse, PageSource};

/// Configuration for an HTTP list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSourceConfig {
    /// Endpoint URL (e.g., `http://localhost:3000/api/pagamentos`).
    pub url: String,
    /// Query parameter carrying the search text.
    #[serde(default = "default_search_param")]
    pub search_param: String,
    /// Query parameter carrying the page number.
    #[serde(default = "default_page_param")]
    pub page_param: String,
    /// Query parameter carrying the page size.
    #[serde(default = "default_limit_param")]
    pub limit_param: String,
    /// Optional bearer token.
    #[serde(default)]
    pub token: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_param() -> String {
    "search".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_limit_param() -> String {
    "limit".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl HttpSourceConfig {
    /// Creates a config with default parameter names.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            search_param: default_search_param(),
            page_param: default_page_param(),
            limit_param: default_limit_param(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Either wire shape the endpoint may answer with.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseBody<T> {
    Paged(PageResponse<T>),
    Bare(Vec<T>),
}

/// HTTP list endpoint.
pub struct HttpPageSource<T> {
    config: HttpSourceConfig,
    client: Client,
    _records: PhantomData<fn() -> T>,
}

impl<T> HttpPageSource<T> {
    /// Creates a new HTTP source with a configured client.
    ///
    /// # Errors
    ///
    /// Returns a config error if the URL is not http(s).
    pub fn new(config: HttpSourceConfig) -> Result<Self> {
        validate_url(&config.url)?;
        let client = create_http_client(Duration::from_secs(config.timeout_secs.max(1)));
        Ok(Self {
            config,
            client,
            _records: PhantomData,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &HttpSourceConfig {
        &self.config
    }

    /// Builds the query string pairs for a request.
    fn query_pairs(&self, request: &PageRequest) -> Vec<(String, String)> {
        let mut pairs = vec![
            (self.config.page_param.clone(), request.page.to_string()),
            (self.config.limit_param.clone(), request.page_size.to_string()),
        ];
        if let Some(search) = &request.search {
            pairs.push((self.config.search_param.clone(), search.clone()));
        }
        for (name, value) in &request.filters {
            pairs.push((name.clone(), display_value(value)));
        }
        pairs
    }
}

#[async_trait]
impl<T> PageSource<T> for HttpPageSource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn source_type(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, request: &PageRequest) -> Result<PageResponse<T>> {
        let pairs = self.query_pairs(request);
        debug!(url = %self.config.url, ?pairs, "fetching page");

        let mut builder = self.client.get(&self.config.url).query(&pairs);
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(handle_http_error(status.as_u16(), &body, "List endpoint"));
        }

        let text = response.text().await?;
        let body: ResponseBody<T> = serde_json::from_str(&text)
            .map_err(|e| Error::Decode(format!("Failed to parse page response: {e}")))?;

        Ok(match body {
            ResponseBody::Paged(page) => page,
            ResponseBody::Bare(records) => PageResponse::complete(records),
        })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
