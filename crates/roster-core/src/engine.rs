//! The list engine.
//!
//! One [`ListEngine`] backs one list view. It owns the query state, the
//! debounced search timer, the windowed fetch and every derived structure
//! (filtered view, pagination, estimates). Public operations mutate state
//! synchronously and never wait; timers and fetches run as background tasks
//! whose results are applied when the owner calls [`ListEngine::next_event`]
//! or [`ListEngine::settle`].
//!
//! ```rust,ignore
//! let mut engine = ListEngine::new(source, spec, EngineConfig::default())?;
//! engine.refresh();
//! engine.set_search("silva");
//! engine.settle().await;
//! let rows = engine.visible_page();
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::error::Result;
use crate::estimate::{estimate_all, Metric, SampleEstimate};
use crate::fetch::{FetchController, FetchOutcome, FetchWindow, Generation};
use crate::filter::{FilterRegistry, FilterValue};
use crate::page_window::{page_window, PageToken};
use crate::query::{QueryState, ServerQuery};
use crate::source::{PageRequest, PageSource};
use crate::view::{filter_indices, page_slice, PaginationDescriptor};

/// Local full-text matcher: `(record, search_text) -> matches`.
pub type SearchMatcher<T> = Arc<dyn Fn(&T, &str) -> bool + Send + Sync>;

/// Sort order applied to each fetched window.
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Declares how a list filters, searches, sorts and summarizes its records.
pub struct ListSpec<T> {
    filters: FilterRegistry<T>,
    server_filters: Vec<String>,
    search: Option<SearchMatcher<T>>,
    sort: Option<Comparator<T>>,
    metrics: IndexMap<String, Metric<T>>,
}

impl<T> Default for ListSpec<T> {
    fn default() -> Self {
        Self {
            filters: FilterRegistry::new(),
            server_filters: Vec::new(),
            search: None,
            sort: None,
            metrics: IndexMap::new(),
        }
    }
}

impl<T> Clone for ListSpec<T> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            server_filters: self.server_filters.clone(),
            search: self.search.clone(),
            sort: self.sort.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<T> fmt::Debug for ListSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListSpec")
            .field("filters", &self.filters)
            .field("server_filters", &self.server_filters)
            .field("search", &self.search.is_some())
            .field("sort", &self.sort.is_some())
            .field("metrics", &self.metrics.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> ListSpec<T> {
    /// Creates a list with no filters, search, sort or metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the local filter registry.
    #[must_use]
    pub fn filters(mut self, filters: FilterRegistry<T>) -> Self {
        self.filters = filters;
        self
    }

    /// Adds a local filter evaluated by `predicate`.
    #[must_use]
    pub fn predicate<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T, &FilterValue) -> bool + Send + Sync + 'static,
    {
        self.filters = self.filters.predicate(name, predicate);
        self
    }

    /// Adds a local filter matching against a field of the record.
    #[must_use]
    pub fn field_filter<F>(mut self, name: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.filters = self.filters.field(name, extract);
        self
    }

    /// Forwards `name` to the source when its value is exact.
    ///
    /// A server filter with no local predicate is applied by the source only.
    #[must_use]
    pub fn server_filter(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.server_filters.contains(&name) {
            self.server_filters.push(name);
        }
        self
    }

    /// Also matches the debounced search against the window locally.
    #[must_use]
    pub fn search_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&T, &str) -> bool + Send + Sync + 'static,
    {
        self.search = Some(Arc::new(matcher));
        self
    }

    /// Sorts each fetched window (stable).
    #[must_use]
    pub fn sort_by<F>(mut self, compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.sort = Some(Arc::new(compare));
        self
    }

    /// Adds a named metric. Metrics are reported in declaration order.
    #[must_use]
    pub fn metric(mut self, name: impl Into<String>, metric: Metric<T>) -> Self {
        self.metrics.insert(name.into(), metric);
        self
    }

    /// Filter names forwarded to the source.
    #[must_use]
    pub fn server_filters(&self) -> &[String] {
        &self.server_filters
    }

    /// Local filter registry.
    #[must_use]
    pub fn filter_registry(&self) -> &FilterRegistry<T> {
        &self.filters
    }

    /// Declared metrics.
    #[must_use]
    pub fn metrics(&self) -> &IndexMap<String, Metric<T>> {
        &self.metrics
    }

    fn accepts(&self, record: &T, query: &QueryState) -> bool {
        if !self.filters.matches(record, query.filters()) {
            return false;
        }
        let search = query.debounced_search().trim();
        match &self.search {
            Some(matcher) if !search.is_empty() => matcher(record, search),
            _ => true,
        }
    }
}

/// Something the engine applied while being driven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The debounced search changed.
    SearchCommitted {
        /// Committed text.
        search: String,
        /// Fetch issued because of it, if the server query changed.
        generation: Option<Generation>,
    },
    /// A new window was installed.
    WindowApplied {
        /// Generation applied.
        generation: Generation,
        /// Records in the window.
        records: usize,
        /// Population reported by the source.
        population: usize,
    },
    /// A superseded fetch finished and was dropped.
    StaleDiscarded {
        /// Generation discarded.
        generation: Generation,
    },
    /// The latest fetch failed; the previous window is still shown.
    FetchFailed {
        /// Generation that failed.
        generation: Generation,
        /// Human-readable error.
        message: String,
    },
}

enum Wake {
    Search(String),
    Fetch(FetchOutcome),
}

/// Everything a list view renders, borrowed from the engine.
#[derive(Debug, Serialize)]
pub struct ListSnapshot<'a, T> {
    /// Query state.
    pub query: &'a QueryState,
    /// Records on the current page.
    pub page: Vec<&'a T>,
    /// Pagination of the filtered view.
    pub pagination: PaginationDescriptor,
    /// Page-number controls.
    pub page_window: Vec<PageToken>,
    /// Metrics by name.
    pub estimates: &'a IndexMap<String, SampleEstimate>,
    /// The latest fetch is in flight.
    pub loading: bool,
    /// Error of the latest fetch.
    pub error: Option<&'a str>,
}

/// List management engine for one list view.
pub struct ListEngine<T> {
    spec: ListSpec<T>,
    config: EngineConfig,
    query: QueryState,
    debouncer: Debouncer<String>,
    fetch: FetchController<T>,
    issued: Option<ServerQuery>,
    filtered: Vec<usize>,
    pagination: PaginationDescriptor,
    estimates: IndexMap<String, SampleEstimate>,
    root: CancellationToken,
    disposed: bool,
}

impl<T> fmt::Debug for ListEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListEngine")
            .field("query", &self.query)
            .field("pagination", &self.pagination)
            .field("generation", &self.fetch.latest_generation())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> ListEngine<T> {
    /// Creates an engine over `source`. Nothing is fetched until the first
    /// query change or [`Self::refresh`].
    ///
    /// Pass an `Arc` to keep a handle on the source.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new<S>(source: S, spec: ListSpec<T>, config: EngineConfig) -> Result<Self>
    where
        S: PageSource<T> + 'static,
    {
        config.validate()?;

        let source: Arc<dyn PageSource<T>> = Arc::new(source);

        let root = CancellationToken::new();
        let debouncer = Debouncer::new(config.debounce_delay(), root.clone());
        let fetch = FetchController::new(source, &config.fetch, root.child_token());
        let query = QueryState::new(config.list.page_size);
        let pagination = PaginationDescriptor::new(0, 1, config.list.page_size);

        let mut engine = Self {
            spec,
            config,
            query,
            debouncer,
            fetch,
            issued: None,
            filtered: Vec::new(),
            pagination,
            estimates: IndexMap::new(),
            root,
            disposed: false,
        };
        engine.recompute_estimates();
        Ok(engine)
    }

    // ---- operations -------------------------------------------------------

    /// Updates the search text and restarts the debounce timer.
    ///
    /// Resets to page 1. The text reaches the source only after it has been
    /// left unchanged for the debounce delay.
    pub fn set_search(&mut self, text: impl Into<String>) {
        if self.disposed {
            return;
        }
        let text = text.into();
        self.query.set_raw_search(text.clone());
        self.debouncer.schedule(text);
        self.reslice();
    }

    /// Sets one filter and resets to page 1.
    ///
    /// `FilterValue::All` (or `"all"`) removes the constraint.
    pub fn set_filter(&mut self, name: impl Into<String>, value: impl Into<FilterValue>) {
        if self.disposed {
            return;
        }
        let name = name.into();
        let value = value.into();
        debug!(filter = %name, value = %value, "set filter");
        if self.query.set_filter(name, value) {
            self.refilter();
            self.sync_server_query();
        } else {
            self.reslice();
        }
    }

    /// Removes every filter and resets to page 1.
    pub fn clear_filters(&mut self) {
        if self.disposed {
            return;
        }
        if self.query.clear_filters() {
            self.refilter();
            self.sync_server_query();
        } else {
            self.reslice();
        }
    }

    /// Moves to `page`, clamped to the available pages.
    pub fn set_page(&mut self, page: usize) {
        self.query.set_page(page);
        self.reslice();
    }

    /// Changes the page size. Never refetches.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.query.set_page_size(page_size);
        self.reslice();
    }

    /// Moves one page forward, if possible.
    pub fn next_page(&mut self) {
        if self.pagination.has_next {
            self.set_page(self.pagination.current_page + 1);
        }
    }

    /// Moves one page back, if possible.
    pub fn previous_page(&mut self) {
        if self.pagination.has_previous {
            self.set_page(self.pagination.current_page - 1);
        }
    }

    /// Moves to page 1.
    pub fn first_page(&mut self) {
        self.set_page(1);
    }

    /// Moves to the last page.
    pub fn last_page(&mut self) {
        self.set_page(self.pagination.total_pages);
    }

    /// Fetches the current server query again under a new generation.
    pub fn refresh(&mut self) -> Option<Generation> {
        if self.disposed {
            return None;
        }
        let query = self.query.server_query(&self.spec.server_filters);
        Some(self.issue(query))
    }

    /// Re-issues the last request under a new generation.
    pub fn retry(&mut self) -> Option<Generation> {
        if self.disposed {
            return None;
        }
        let generation = self.fetch.retry();
        if let Some(generation) = generation {
            info!(generation, "retrying fetch");
        }
        generation
    }

    /// Stops all pending work. Later results are ignored.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.root.cancel();
        self.debouncer.cancel();
        self.fetch.dispose();
        self.disposed = true;
        debug!("list engine disposed");
    }

    // ---- driving ----------------------------------------------------------

    /// Waits for the next timer or fetch to finish and applies it.
    ///
    /// Returns `None` when nothing is pending or the engine is disposed.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        if self.disposed {
            return None;
        }
        let search_pending = self.debouncer.is_pending();
        let fetch_pending = self.fetch.has_outstanding();
        if !search_pending && !fetch_pending {
            return None;
        }

        let wake = tokio::select! {
            text = self.debouncer.settled(), if search_pending => Wake::Search(text),
            outcome = self.fetch.completed(), if fetch_pending => Wake::Fetch(outcome),
        };

        Some(match wake {
            Wake::Search(text) => self.apply_search(text),
            Wake::Fetch(outcome) => self.apply_outcome(outcome),
        })
    }

    /// Drives the engine until no search is pending and the latest fetch has
    /// finished. Returns the events applied on the way.
    pub async fn settle(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while self.is_searching() || self.fetch.is_loading() {
            match self.next_event().await {
                Some(event) => events.push(event),
                None => break,
            }
        }
        events
    }

    fn apply_search(&mut self, text: String) -> EngineEvent {
        debug!(search = %text, "search committed");
        self.query.commit_search(text.clone());
        self.refilter();
        let generation = self.sync_server_query();
        EngineEvent::SearchCommitted {
            search: text,
            generation,
        }
    }

    fn apply_outcome(&mut self, outcome: FetchOutcome) -> EngineEvent {
        match outcome {
            FetchOutcome::Applied {
                generation,
                records,
                population,
            } => {
                if let (Some(compare), Some(window)) = (&self.spec.sort, self.fetch.records_mut()) {
                    window.sort_by(|a, b| compare(a, b));
                }
                self.refilter();
                EngineEvent::WindowApplied {
                    generation,
                    records,
                    population,
                }
            }
            FetchOutcome::Stale { generation } => EngineEvent::StaleDiscarded { generation },
            FetchOutcome::Failed {
                generation,
                message,
            } => EngineEvent::FetchFailed {
                generation,
                message,
            },
        }
    }

    // ---- derived state ----------------------------------------------------

    fn sync_server_query(&mut self) -> Option<Generation> {
        if self.disposed {
            return None;
        }
        let query = self.query.server_query(&self.spec.server_filters);
        if self.issued.as_ref() == Some(&query) {
            return None;
        }
        Some(self.issue(query))
    }

    fn issue(&mut self, query: ServerQuery) -> Generation {
        let request = PageRequest::window(&query, self.fetch.window_size());
        self.issued = Some(query);
        self.fetch.issue(request)
    }

    fn refilter(&mut self) {
        self.filtered = match self.fetch.window() {
            Some(window) => filter_indices(&window.records, |record| {
                self.spec.accepts(record, &self.query)
            }),
            None => Vec::new(),
        };
        self.reslice();
        self.recompute_estimates();
    }

    fn reslice(&mut self) {
        self.pagination = PaginationDescriptor::new(
            self.filtered.len(),
            self.query.page(),
            self.query.page_size(),
        );
        self.query.set_page(self.pagination.current_page);
    }

    fn recompute_estimates(&mut self) {
        let (records, population) = match self.fetch.window() {
            Some(window) => (window.records.as_slice(), window.population),
            None => (&[][..], 0),
        };
        self.estimates = estimate_all(&self.spec.metrics, records, &self.filtered, population);
    }
}

impl<T: Send + Sync + 'static> ListEngine<T> {
    // ---- accessors --------------------------------------------------------

    /// Current query state.
    #[must_use]
    pub fn query(&self) -> &QueryState {
        &self.query
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The list's declaration.
    #[must_use]
    pub fn spec(&self) -> &ListSpec<T> {
        &self.spec
    }

    /// Records on the current page, in view order.
    #[must_use]
    pub fn visible_page(&self) -> Vec<&T> {
        match self.fetch.window() {
            Some(window) => page_slice(&window.records, &self.filtered, &self.pagination),
            None => Vec::new(),
        }
    }

    /// Number of window records passing local filters and search.
    #[must_use]
    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    /// Pagination of the filtered view.
    #[must_use]
    pub fn pagination(&self) -> &PaginationDescriptor {
        &self.pagination
    }

    /// Page-number controls for the current page.
    #[must_use]
    pub fn page_window(&self) -> Vec<PageToken> {
        page_window(
            self.pagination.current_page,
            self.pagination.total_pages,
            self.config.list.max_visible_pages,
        )
    }

    /// All metrics, in declaration order.
    #[must_use]
    pub fn estimates(&self) -> &IndexMap<String, SampleEstimate> {
        &self.estimates
    }

    /// One metric by name.
    #[must_use]
    pub fn estimate(&self, name: &str) -> Option<&SampleEstimate> {
        self.estimates.get(name)
    }

    /// The latest fetch is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.fetch.is_loading()
    }

    /// Typed search text is waiting for the debounce delay.
    #[must_use]
    pub fn is_searching(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Error of the latest fetch, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.fetch.error()
    }

    /// The last applied window.
    #[must_use]
    pub fn window(&self) -> Option<&FetchWindow<T>> {
        self.fetch.window()
    }

    /// Latest generation issued.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.fetch.latest_generation()
    }

    /// Returns true once [`ListEngine::dispose`] has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Everything a list view renders, in one borrow.
    #[must_use]
    pub fn snapshot(&self) -> ListSnapshot<'_, T> {
        ListSnapshot {
            query: &self.query,
            page: self.visible_page(),
            pagination: self.pagination,
            page_window: self.page_window(),
            estimates: &self.estimates,
            loading: self.is_loading(),
            error: self.error(),
        }
    }
}

impl<T> Drop for ListEngine<T> {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
