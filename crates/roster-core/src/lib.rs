//! # Roster List Engine
//!
//! `roster-core` backs the list views of a school administration console
//! (students, payments, confirmations, teachers, transfers). Each view is a
//! [`ListEngine`] that combines:
//!
//! | Stage | Module | Notes |
//! |-------|--------|-------|
//! | Debounced search | [`debounce`] | Trailing debounce, 500 ms by default |
//! | Filters | [`filter`] | Named predicates, AND-composed, `"all"` means no constraint |
//! | Windowed fetch | [`fetch`] | Up to `window_size` records, newest generation wins |
//! | Filter and paginate | [`view`] | Local, order preserving, page clamped |
//! | Page window | [`page_window`] | `1 … 4 5 [6] 7 8 … 12` |
//! | Estimates | [`estimate`] | Totals and counts projected to the reported population |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use roster_core::{EngineConfig, ListEngine, ListSpec, MemorySource, Metric};
//! use std::sync::Arc;
//!
//! let source = Arc::new(MemorySource::new(payments));
//! let spec = ListSpec::new()
//!     .field_filter("status", |p: &Payment| p.status.into())
//!     .server_filter("status")
//!     .metric("received", Metric::total(|p: &Payment| p.amount));
//!
//! let mut engine = ListEngine::new(source, spec, EngineConfig::default())?;
//! engine.refresh();
//! engine.settle().await;
//! println!("{:?}", engine.pagination());
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! [list]
//! debounce_ms = 500
//! page_size = 10
//! max_visible_pages = 5
//!
//! [fetch]
//! window_size = 1000
//! max_retries = 2
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod fetch;
pub mod filter;
pub mod page_window;
pub mod query;
pub mod retry;
pub mod source;
pub mod view;

pub use config::{ConfigError, EngineConfig, FetchConfig, ListConfig, LoggingConfig};
pub use engine::{EngineEvent, ListEngine, ListSnapshot, ListSpec};
pub use error::{Error, Result};
pub use estimate::{Basis, Metric, MetricKind, SampleEstimate};
pub use fetch::{FetchWindow, Generation};
pub use filter::{FilterRegistry, FilterSet, FilterValue};
pub use page_window::{page_window, PageToken};
pub use query::{QueryState, ServerQuery};
pub use source::{
    HttpPageSource, HttpSourceConfig, MemorySource, PageRequest, PageResponse, PageSource,
};
pub use view::PaginationDescriptor;
