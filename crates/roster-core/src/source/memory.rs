//! In-process list endpoint.
//!
//! Serves a `Vec<T>` the way a paged HTTP endpoint would. Used by the CLI
//! for JSON files and by tests, which can queue failures and add latency
//! to reproduce slow or flaky endpoints.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::source::{PageRequest, PageResponse, PageSource, RemotePagination};

/// Server-side search: `(record, search_text) -> matches`.
pub type ServerSearch<T> = Arc<dyn Fn(&T, &str) -> bool + Send + Sync>;

/// Server-side equality filter: `(record, filter_name, value) -> matches`.
pub type ServerFilter<T> = Arc<dyn Fn(&T, &str, &Value) -> bool + Send + Sync>;

/// Simulated response time per request.
pub type Latency = Arc<dyn Fn(&PageRequest) -> Duration + Send + Sync>;

/// In-memory paged source.
pub struct MemorySource<T> {
    records: Vec<T>,
    search: Option<ServerSearch<T>>,
    filter: Option<ServerFilter<T>>,
    calls: AtomicUsize,
    failures: Mutex<VecDeque<Error>>,
    latency: Option<Latency>,
    requests: Mutex<Vec<PageRequest>>,
}

impl<T> fmt::Debug for MemorySource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySource")
            .field("records", &self.records.len())
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl<T> MemorySource<T> {
    /// Creates a source serving `records`.
    #[must_use]
    pub fn new(records: Vec<T>) -> Self {
        Self {
            records,
            search: None,
            filter: None,
            calls: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
            latency: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Applies `search` to requests carrying search text.
    #[must_use]
    pub fn with_search<F>(mut self, search: F) -> Self
    where
        F: Fn(&T, &str) -> bool + Send + Sync + 'static,
    {
        self.search = Some(Arc::new(search));
        self
    }

    /// Applies `filter` to every filter carried by a request.
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&T, &str, &Value) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Makes the next call fail with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: Error) {
        self.failures.lock().push_back(error);
    }

    /// Delays every response by `latency(request)`.
    #[must_use]
    pub fn with_latency<F>(mut self, latency: F) -> Self
    where
        F: Fn(&PageRequest) -> Duration + Send + Sync + 'static,
    {
        self.latency = Some(Arc::new(latency));
        self
    }

    /// Number of fetch calls served so far, failures included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().clone()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn accepts(&self, record: &T, request: &PageRequest) -> bool {
        if let (Some(search), Some(text)) = (&self.search, &request.search) {
            if !search(record, text) {
                return false;
            }
        }
        match &self.filter {
            Some(filter) => request
                .filters
                .iter()
                .all(|(name, value)| filter(record, name, value)),
            None => true,
        }
    }
}

#[async_trait]
impl<T> PageSource<T> for MemorySource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn source_type(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self, request: &PageRequest) -> Result<PageResponse<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(latency) = &self.latency {
            tokio::time::sleep(latency(request)).await;
        }

        let failure = self.failures.lock().pop_front();
        if let Some(error) = failure {
            debug!(error = %error, "memory source injected failure");
            return Err(error);
        }

        if request.page == 0 || request.page_size == 0 {
            return Err(Error::InvalidRequest(format!(
                "page and page_size must be positive (page={}, page_size={})",
                request.page, request.page_size
            )));
        }

        let matching: Vec<&T> = self
            .records
            .iter()
            .filter(|record| self.accepts(record, request))
            .collect();
        let total_items = matching.len();
        let data: Vec<T> = matching
            .into_iter()
            .skip((request.page - 1).saturating_mul(request.page_size))
            .take(request.page_size)
            .cloned()
            .collect();

        Ok(PageResponse {
            data,
            pagination: RemotePagination {
                total_items,
                total_pages: total_items.div_ceil(request.page_size),
                current_page: request.page,
                items_per_page: request.page_size,
            },
        })
    }
}
