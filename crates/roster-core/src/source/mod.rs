//! Remote paged-fetch sources.
//!
//! The engine treats every list endpoint as a [`PageSource`]: give it a page
//! request, get back a page of records plus the endpoint's own pagination
//! summary. `pagination.total_items` is the authoritative population size.

pub mod common;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::query::ServerQuery;

pub use http::{HttpPageSource, HttpSourceConfig};
pub use memory::MemorySource;

/// A request for one page of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: usize,
    /// Maximum number of records to return.
    pub page_size: usize,
    /// Full-text search, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Equality filters supported by the endpoint.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, serde_json::Value>,
}

impl PageRequest {
    /// Builds the request for the first window of a server query.
    #[must_use]
    pub fn window(query: &ServerQuery, window_size: usize) -> Self {
        Self {
            page: 1,
            page_size: window_size,
            search: query.search.clone(),
            filters: query.filters.clone(),
        }
    }
}

/// Pagination summary reported by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePagination {
    /// Records matching the query on the server.
    pub total_items: usize,
    /// Pages at `items_per_page`.
    #[serde(default)]
    pub total_pages: usize,
    /// Page that was served.
    #[serde(default)]
    pub current_page: usize,
    /// Page size that was served.
    #[serde(default)]
    pub items_per_page: usize,
}

/// One page of records from the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// Records on this page.
    pub data: Vec<T>,
    /// Pagination summary.
    pub pagination: RemotePagination,
}

impl<T> PageResponse<T> {
    /// Builds a response where the whole population fits in `data`.
    #[must_use]
    pub fn complete(data: Vec<T>) -> Self {
        let total = data.len();
        Self {
            pagination: RemotePagination {
                total_items: total,
                total_pages: usize::from(total > 0),
                current_page: 1,
                items_per_page: total,
            },
            data,
        }
    }
}

/// Trait for remote list endpoints.
///
/// Implement this trait to plug a new endpoint into a list view.
#[async_trait]
pub trait PageSource<T: Send>: Send + Sync {
    /// Get the source type name.
    fn source_type(&self) -> &'static str;

    /// Fetch one page of records.
    ///
    /// # Errors
    ///
    /// Returns a transport, authentication, rate-limit or decode error when
    /// the endpoint cannot serve the page.
    async fn fetch(&self, request: &PageRequest) -> Result<PageResponse<T>>;
}

#[async_trait]
impl<T, S> PageSource<T> for Arc<S>
where
    T: Send,
    S: PageSource<T> + ?Sized,
{
    fn source_type(&self) -> &'static str {
        (**self).source_type()
    }

    async fn fetch(&self, request: &PageRequest) -> Result<PageResponse<T>> {
        (**self).fetch(request).await
    }
}
