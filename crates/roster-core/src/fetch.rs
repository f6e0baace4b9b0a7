//! Windowed fetch with a generation guard.
//!
//! Every request gets a strictly increasing [`Generation`]. Requests run as
//! detached tasks and report back over a channel; a completion is applied
//! only if its generation is still the latest issued, so responses that
//! arrive out of order can never overwrite newer data.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::retry::{with_retry, RetryConfig};
use crate::source::{PageRequest, PageResponse, PageSource};

/// Monotonic request identifier.
pub type Generation = u64;

/// The records last retrieved from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchWindow<T> {
    /// Generation that produced this window.
    pub generation: Generation,
    /// Records in source order.
    pub records: Vec<T>,
    /// Population size reported by the source (`pagination.totalItems`).
    pub population: usize,
}

impl<T> FetchWindow<T> {
    /// Returns true when the window holds fewer records than the population.
    #[must_use]
    pub fn is_sample(&self) -> bool {
        self.records.len() < self.population
    }
}

/// What happened to a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The latest request succeeded and its records are now the window.
    Applied {
        /// Generation applied.
        generation: Generation,
        /// Records in the new window.
        records: usize,
        /// Population reported by the source.
        population: usize,
    },
    /// A superseded request finished and was dropped.
    Stale {
        /// Generation discarded.
        generation: Generation,
    },
    /// The latest request failed; the previous window is kept.
    Failed {
        /// Generation that failed.
        generation: Generation,
        /// Human-readable error.
        message: String,
    },
}

struct Completion<T> {
    generation: Generation,
    result: Result<PageResponse<T>>,
}

/// Issues windowed requests and applies only the latest response.
pub struct FetchController<T> {
    source: Arc<dyn PageSource<T>>,
    retry: RetryConfig,
    timeout: Duration,
    window_size: usize,
    latest: Generation,
    window: Option<FetchWindow<T>>,
    error: Option<String>,
    last_request: Option<PageRequest>,
    loading: bool,
    outstanding: usize,
    disposed: bool,
    root: CancellationToken,
    tx: mpsc::UnboundedSender<Completion<T>>,
    rx: mpsc::UnboundedReceiver<Completion<T>>,
}

impl<T> FetchController<T> {
    /// Maximum records requested per fetch.
    #[must_use]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// The latest generation issued (0 before the first request).
    #[must_use]
    pub fn latest_generation(&self) -> Generation {
        self.latest
    }

    /// The last successfully applied window.
    #[must_use]
    pub fn window(&self) -> Option<&FetchWindow<T>> {
        self.window.as_ref()
    }

    /// Mutable access to the applied window's records (for in-place sorting).
    pub(crate) fn records_mut(&mut self) -> Option<&mut Vec<T>> {
        self.window.as_mut().map(|w| &mut w.records)
    }

    /// Error message of the latest request, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The request behind the latest generation.
    #[must_use]
    pub fn last_request(&self) -> Option<&PageRequest> {
        self.last_request.as_ref()
    }

    /// Returns true while the latest request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns true while any issued request has not reported back.
    #[must_use]
    pub fn has_outstanding(&self) -> bool {
        self.outstanding > 0
    }

    /// Returns true once [`Self::dispose`] has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl<T: Send + 'static> FetchController<T> {
    /// Creates a controller whose requests are children of `parent`.
    #[must_use]
    pub fn new(source: Arc<dyn PageSource<T>>, config: &FetchConfig, parent: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            retry: config.retry_config(),
            timeout: config.timeout(),
            window_size: config.window_size.max(1),
            latest: 0,
            window: None,
            error: None,
            last_request: None,
            loading: false,
            outstanding: 0,
            disposed: false,
            root: parent,
            tx,
            rx,
        }
    }

    /// Issues `request` under a new generation and returns it.
    ///
    /// Older in-flight requests keep running but their results will be
    /// discarded. Does nothing after [`Self::dispose`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn issue(&mut self, request: PageRequest) -> Generation {
        if self.disposed {
            debug!("fetch ignored: controller disposed");
            return self.latest;
        }

        self.latest += 1;
        let generation = self.latest;
        self.loading = true;
        self.outstanding += 1;
        self.last_request = Some(request.clone());

        let source = Arc::clone(&self.source);
        let retry = self.retry.clone();
        let timeout = self.timeout;
        let token = self.root.child_token();
        let tx = self.tx.clone();

        debug!(
            generation,
            source = source.source_type(),
            search = ?request.search,
            filters = ?request.filters,
            "issuing fetch"
        );

        tokio::spawn(async move {
            let fetch = with_retry(&retry, "fetch window", || {
                let source = Arc::clone(&source);
                let request = request.clone();
                async move { fetch_with_timeout(source.as_ref(), &request, timeout).await }
            });

            let result = tokio::select! {
                () = token.cancelled() => return,
                result = fetch => result,
            };
            let _ = tx.send(Completion { generation, result });
        });

        generation
    }

    /// Re-issues the last request under a new generation.
    ///
    /// Returns `None` if nothing was ever requested or the controller is disposed.
    pub fn retry(&mut self) -> Option<Generation> {
        if self.disposed {
            return None;
        }
        let request = self.last_request.clone()?;
        Some(self.issue(request))
    }

    /// Waits for the next request to report back and applies it.
    ///
    /// Never resolves when nothing is outstanding; check
    /// [`Self::has_outstanding`] first. Cancel-safe.
    pub async fn completed(&mut self) -> FetchOutcome {
        match self.rx.recv().await {
            Some(completion) => self.accept(completion),
            None => std::future::pending().await,
        }
    }

    /// Applies a completion that already arrived, if any.
    pub fn try_completed(&mut self) -> Option<FetchOutcome> {
        let completion = self.rx.try_recv().ok()?;
        Some(self.accept(completion))
    }

    /// Cancels every in-flight request and ignores all later results.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.root.cancel();
        self.disposed = true;
        self.loading = false;
        self.outstanding = 0;
        debug!(latest = self.latest, "fetch controller disposed");
    }

    fn accept(&mut self, completion: Completion<T>) -> FetchOutcome {
        self.outstanding = self.outstanding.saturating_sub(1);
        let generation = completion.generation;

        if self.disposed || generation != self.latest {
            debug!(generation, latest = self.latest, "discarding stale fetch result");
            return FetchOutcome::Stale { generation };
        }

        self.loading = false;
        match completion.result {
            Ok(page) => {
                let records = page.data.len();
                let population = page.pagination.total_items;
                info!(generation, records, population, "fetch window applied");
                self.window = Some(FetchWindow {
                    generation,
                    records: page.data,
                    population,
                });
                self.error = None;
                FetchOutcome::Applied {
                    generation,
                    records,
                    population,
                }
            }
            Err(e) => {
                warn!(generation, code = e.code(), error = %e, "fetch failed, keeping previous window");
                let message = e.to_string();
                self.error = Some(message.clone());
                FetchOutcome::Failed {
                    generation,
                    message,
                }
            }
        }
    }
}

async fn fetch_with_timeout<T: Send>(
    source: &dyn PageSource<T>,
    request: &PageRequest,
    timeout: Duration,
) -> Result<PageResponse<T>> {
    match tokio::time::timeout(timeout, source.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Transport(format!(
            "{} request timed out after {}s",
            source.source_type(),
            timeout.as_secs()
        ))),
    }
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
