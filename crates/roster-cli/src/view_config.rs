//! List view files.
//!
//! A view file describes one list: where its records come from, which
//! columns to show, how to search, filter and sort them, and which metrics
//! to estimate. Loaded with figment: the TOML file, then `ROSTER_VIEW_*`
//! environment overrides (`__` separates sections).

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use roster_core::filter::json::{
    as_number, compare_sort_keys, contains_text, get_field, values_equal,
};
use roster_core::source::common::json_records;
use roster_core::{
    EngineConfig, HttpPageSource, HttpSourceConfig, ListEngine, ListSpec, MemorySource, Metric,
    MetricKind, PageSource,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where records come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceSection {
    /// Remote list endpoint.
    Http(HttpSourceConfig),
    /// Local JSON file.
    File {
        /// Path to the file, relative to the view file.
        path: PathBuf,
        /// Dot path to the records array; empty if the root is the array.
        #[serde(default)]
        array_path: String,
    },
}

/// A named filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSection {
    /// Filter name, as used by `--filter NAME=VALUE`.
    pub name: String,
    /// Record field the filter compares (dot path). Defaults to `name`.
    #[serde(default)]
    pub field: Option<String>,
    /// Forward exact values to the source as a query parameter.
    #[serde(default)]
    pub server: bool,
    /// Also evaluate the filter on the fetched window.
    #[serde(default = "default_true")]
    pub local: bool,
}

impl FilterSection {
    /// The record field this filter reads.
    pub fn field(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.name)
    }
}

/// Window sort order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSection {
    /// Field to sort by (dot path).
    pub field: String,
    /// Largest first.
    #[serde(default)]
    pub descending: bool,
}

/// A named metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSection {
    /// Label shown in the statistics table.
    pub name: String,
    /// Aggregate kind.
    pub kind: MetricKind,
    /// Field the metric reads (dot path).
    #[serde(default)]
    pub field: Option<String>,
    /// For counts and percentages: the value `field` must equal.
    /// Without it, any non-null, non-false, non-zero value counts.
    #[serde(default)]
    pub equals: Option<Value>,
}

/// One list view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Title printed above the table.
    #[serde(default)]
    pub title: Option<String>,
    /// Record source.
    pub source: SourceSection,
    /// Columns to display (dot paths). Empty shows every top-level field.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Fields matched locally against the search text. Empty leaves search
    /// to the source.
    #[serde(default)]
    pub search_fields: Vec<String>,
    /// Window sort order.
    #[serde(default)]
    pub sort: Option<SortSection>,
    /// Filters.
    #[serde(default)]
    pub filters: Vec<FilterSection>,
    /// Metrics.
    #[serde(default)]
    pub metrics: Vec<MetricSection>,
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_true() -> bool {
    true
}

impl ViewConfig {
    /// Loads a view file with `ROSTER_VIEW_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed or invalid.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("View file not found: {}", path.display());
        }

        let mut view: Self = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("ROSTER_VIEW_").split("__"))
            .extract()
            .with_context(|| format!("Failed to parse view file {}", path.display()))?;

        view.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        view.validate()?;
        Ok(view)
    }

    /// Parses a view from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or the view is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let view: Self = Figment::new()
            .merge(Toml::string(toml_str))
            .extract()
            .context("Failed to parse view")?;
        view.validate()?;
        Ok(view)
    }

    /// Validates the view and its engine settings.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        if let SourceSection::File { path, .. } = &self.source {
            if path.as_os_str().is_empty() {
                bail!("source.path must not be empty");
            }
        }

        for (i, filter) in self.filters.iter().enumerate() {
            if filter.name.trim().is_empty() {
                bail!("filters[{i}].name must not be empty");
            }
            if self.filters[..i].iter().any(|f| f.name == filter.name) {
                bail!("filter '{}' is declared twice", filter.name);
            }
            if !filter.local && !filter.server {
                bail!("filter '{}' is neither local nor server", filter.name);
            }
        }

        for metric in &self.metrics {
            let needs_field = matches!(metric.kind, MetricKind::Total | MetricKind::Average);
            if needs_field && metric.field.is_none() {
                bail!("metric '{}' ({:?}) needs a field", metric.name, metric.kind);
            }
        }

        Ok(())
    }

    /// Resolved path of a file source.
    pub fn file_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Builds the list declaration for JSON records.
    pub fn build_spec(&self) -> ListSpec<Value> {
        let mut spec = ListSpec::new();

        for filter in &self.filters {
            if filter.local {
                let field = filter.field().to_string();
                spec = spec.field_filter(filter.name.clone(), move |record: &Value| {
                    get_field(record, &field).cloned().unwrap_or(Value::Null)
                });
            }
            if filter.server {
                spec = spec.server_filter(filter.name.clone());
            }
        }

        if !self.search_fields.is_empty() {
            let fields = self.search_fields.clone();
            spec = spec.search_matcher(move |record: &Value, text| contains_text(record, &fields, text));
        }

        if let Some(sort) = &self.sort {
            let field = sort.field.clone();
            let descending = sort.descending;
            spec = spec.sort_by(move |a: &Value, b: &Value| {
                let ordering = compare_sort_keys(get_field(a, &field), get_field(b, &field));
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        for metric in &self.metrics {
            spec = spec.metric(metric.name.clone(), build_metric(metric));
        }

        spec
    }

    /// Builds the record source.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the file cannot be read.
    pub fn build_source(&self) -> Result<Arc<dyn PageSource<Value>>> {
        match &self.source {
            SourceSection::Http(config) => {
                let source = HttpPageSource::<Value>::new(config.clone())?;
                Ok(Arc::new(source))
            }
            SourceSection::File { path, array_path } => {
                let path = self.file_path(path);
                let records = json_records(&path, array_path)
                    .with_context(|| format!("Failed to load records from {}", path.display()))?;

                let search_fields = self.search_fields.clone();
                let server_fields: Vec<(String, String)> = self
                    .filters
                    .iter()
                    .filter(|f| f.server)
                    .map(|f| (f.name.clone(), f.field().to_string()))
                    .collect();

                let source = MemorySource::new(records)
                    .with_search(move |record: &Value, text| {
                        contains_text(record, &search_fields, text)
                    })
                    .with_filter(move |record: &Value, name, value| {
                        match server_fields.iter().find(|(n, _)| n == name) {
                            Some((_, field)) => {
                                get_field(record, field).is_some_and(|v| values_equal(v, value))
                            }
                            None => true,
                        }
                    });
                Ok(Arc::new(source))
            }
        }
    }

    /// Builds an engine for this view.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be built or the engine
    /// settings are invalid.
    pub fn build_engine(&self) -> Result<ListEngine<Value>> {
        let source = self.build_source()?;
        Ok(ListEngine::new(source, self.build_spec(), self.engine.clone())?)
    }
}

/// Returns true if `name` is a filter the list evaluates locally or
/// forwards to its source.
pub fn declares_filter(spec: &ListSpec<Value>, name: &str) -> bool {
    spec.filter_registry().contains(name) || spec.server_filters().iter().any(|f| f == name)
}

fn build_metric(section: &MetricSection) -> Metric<Value> {
    let field = section.field.clone().unwrap_or_default();
    let number = {
        let field = field.clone();
        move |record: &Value| get_field(record, &field).and_then(as_number).unwrap_or(0.0)
    };
    let condition = {
        let equals = section.equals.clone();
        move |record: &Value| {
            let value = if field.is_empty() {
                Some(record)
            } else {
                get_field(record, &field)
            };
            match (&equals, value) {
                (Some(expected), Some(actual)) => values_equal(actual, expected),
                (Some(_), None) => false,
                (None, value) => is_present(value),
            }
        }
    };

    match section.kind {
        MetricKind::Total => Metric::total(number),
        MetricKind::Average => Metric::average(number),
        MetricKind::Count => Metric::count(condition),
        MetricKind::Percentage => Metric::percentage(condition),
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// View file written by `roster init`.
pub const VIEW_TEMPLATE: &str = r#"# Roster list view
title = "Payments"

# Columns shown in the table (dot paths). Leave empty to show every field.
columns = ["id", "student.name", "amount", "status", "due_date"]

# Fields matched locally against the search text.
# Leave empty to let the endpoint search on its own.
search_fields = ["student.name", "reference"]

[source]
kind = "http"
url = "http://localhost:3000/api/pagamentos"
# search_param = "search"
# page_param = "page"
# limit_param = "limit"
# token = "..."

# [source]
# kind = "file"
# path = "payments.json"
# array_path = "data"

[sort]
field = "due_date"
descending = true

[[filters]]
name = "status"
server = true

[[filters]]
name = "amount"
field = "amount"

[[metrics]]
name = "Total received"
kind = "total"
field = "amount"

[[metrics]]
name = "Paid"
kind = "count"
field = "status"
equals = 1

[[metrics]]
name = "Average payment"
kind = "average"
field = "amount"

[engine.list]
debounce_ms = 500
page_size = 10
max_visible_pages = 5

[engine.fetch]
window_size = 1000
timeout_secs = 30
max_retries = 2

[engine.logging]
level = "warn"
format = "text"
"#;
