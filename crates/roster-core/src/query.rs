//! Query state of a list view.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::filter::{FilterSet, FilterValue};

/// Everything the user has asked of a list: search text, filters, page.
///
/// Only the engine mutates it; readers get it through `ListEngine::query()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryState {
    raw_search: String,
    debounced_search: String,
    filters: FilterSet,
    page: usize,
    page_size: usize,
}

impl QueryState {
    /// Creates an empty query on page 1.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            raw_search: String::new(),
            debounced_search: String::new(),
            filters: FilterSet::new(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    /// Search text as typed.
    #[must_use]
    pub fn raw_search(&self) -> &str {
        &self.raw_search
    }

    /// Search text after the debounce delay.
    #[must_use]
    pub fn debounced_search(&self) -> &str {
        &self.debounced_search
    }

    /// Active filters.
    #[must_use]
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Current page (1-based).
    #[must_use]
    pub fn page(&self) -> usize {
        self.page
    }

    /// Records per page.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns true while typed text has not yet been committed.
    #[must_use]
    pub fn search_pending(&self) -> bool {
        self.raw_search != self.debounced_search
    }

    pub(crate) fn set_raw_search(&mut self, text: String) {
        self.raw_search = text;
        self.page = 1;
    }

    pub(crate) fn commit_search(&mut self, text: String) {
        self.debounced_search = text;
    }

    /// Returns true if the filter set changed. The page resets either way.
    pub(crate) fn set_filter(&mut self, name: String, value: FilterValue) -> bool {
        self.page = 1;
        self.filters.set(name, value)
    }

    pub(crate) fn clear_filters(&mut self) -> bool {
        self.page = 1;
        self.filters.clear()
    }

    pub(crate) fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub(crate) fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
    }

    /// The part of the query the remote source sees.
    ///
    /// Only filters named in `server_filters` with an `Exact` value are
    /// forwarded; everything else is applied locally.
    #[must_use]
    pub fn server_query(&self, server_filters: &[String]) -> ServerQuery {
        let search = self.debounced_search.trim();
        let filters = self
            .filters
            .iter()
            .filter(|(name, _)| server_filters.iter().any(|s| s == name))
            .filter_map(|(name, value)| Some((name.to_string(), value.as_exact()?.clone())))
            .collect();

        ServerQuery {
            search: (!search.is_empty()).then(|| search.to_string()),
            filters,
        }
    }
}

/// Server-visible projection of the query state.
///
/// A fetch is issued only when this changes (or on explicit refresh).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerQuery {
    /// Full-text search, if any.
    pub search: Option<String>,
    /// Equality filters the endpoint supports.
    pub filters: BTreeMap<String, Value>,
}
