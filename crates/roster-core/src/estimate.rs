//! Sample-based statistics.
//!
//! A fetch window usually holds fewer records than the population the
//! source reports. Totals and counts are projected from the window to the
//! population; averages and percentages are taken from the window as is.
//! Every result carries its [`Basis`] so callers can mark estimates.
//!
//! With `n` records in the window, `N` the population and `F` the filtered
//! view, a projected metric is `Σ_{r∈F} metric(r) / n × N`. Records outside
//! `F` contribute zero. When `n ≥ N` the exact sum over `F` is returned.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Whether a value was computed from the whole population or extrapolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Basis {
    /// Extrapolated from a window smaller than the population.
    Sample,
    /// Computed over every record.
    Population,
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sample => f.write_str("sample"),
            Self::Population => f.write_str("population"),
        }
    }
}

/// One computed metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleEstimate {
    /// The metric value.
    pub value: f64,
    /// How the value was obtained.
    pub basis: Basis,
    /// Records in the window (`n`).
    pub sample_size: usize,
    /// Population reported by the source (`N`).
    pub population: usize,
}

impl SampleEstimate {
    /// Returns true if the value was extrapolated.
    #[must_use]
    pub fn is_estimated(&self) -> bool {
        self.basis == Basis::Sample
    }
}

/// Metric kinds, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Projected sum.
    Total,
    /// Projected count of matching records.
    Count,
    /// Mean over the filtered window.
    Average,
    /// Share of filtered records matching, in percent.
    Percentage,
}

impl MetricKind {
    /// Returns true for kinds extrapolated to the population.
    #[must_use]
    pub const fn is_projected(self) -> bool {
        matches!(self, Self::Total | Self::Count)
    }
}

/// Numeric value of a record.
pub type Extractor<T> = Arc<dyn Fn(&T) -> f64 + Send + Sync>;

/// Record condition.
pub type Condition<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// An aggregate over the records of a list.
pub enum Metric<T> {
    /// Projected sum of the extracted value.
    Total(Extractor<T>),
    /// Projected number of records satisfying the condition.
    Count(Condition<T>),
    /// Mean of the extracted value over the filtered window.
    Average(Extractor<T>),
    /// Percentage of filtered records satisfying the condition.
    Percentage(Condition<T>),
}

impl<T> Clone for Metric<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Total(f) => Self::Total(Arc::clone(f)),
            Self::Count(f) => Self::Count(Arc::clone(f)),
            Self::Average(f) => Self::Average(Arc::clone(f)),
            Self::Percentage(f) => Self::Percentage(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Metric<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Metric::{:?}", self.kind())
    }
}

impl<T> Metric<T> {
    /// Projected sum of `extract`.
    pub fn total<F>(extract: F) -> Self
    where
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        Self::Total(Arc::new(extract))
    }

    /// Projected count of records matching `condition`.
    pub fn count<F>(condition: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::Count(Arc::new(condition))
    }

    /// Mean of `extract`.
    pub fn average<F>(extract: F) -> Self
    where
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        Self::Average(Arc::new(extract))
    }

    /// Percentage of records matching `condition`.
    pub fn percentage<F>(condition: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::Percentage(Arc::new(condition))
    }

    /// The metric's kind.
    #[must_use]
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Total(_) => MetricKind::Total,
            Self::Count(_) => MetricKind::Count,
            Self::Average(_) => MetricKind::Average,
            Self::Percentage(_) => MetricKind::Percentage,
        }
    }

    /// Computes the metric over `filtered` indices of `window`.
    ///
    /// `population` is the size the source reported for the whole result.
    #[must_use]
    pub fn estimate(&self, window: &[T], filtered: &[usize], population: usize) -> SampleEstimate {
        let sample_size = window.len();
        let basis = if sample_size < population {
            Basis::Sample
        } else {
            Basis::Population
        };

        if sample_size == 0 {
            return SampleEstimate {
                value: 0.0,
                basis: Basis::Population,
                sample_size,
                population,
            };
        }

        let selected = filtered.iter().filter_map(|&i| window.get(i));
        let matched = filtered.len() as f64;

        let value = match self {
            Self::Total(extract) => project(selected.map(|r| extract(r)).sum(), sample_size, population),
            Self::Count(condition) => {
                let hits = selected.filter(|r| condition(r)).count() as f64;
                project(hits, sample_size, population)
            }
            Self::Average(extract) => {
                if filtered.is_empty() {
                    0.0
                } else {
                    selected.map(|r| extract(r)).sum::<f64>() / matched
                }
            }
            Self::Percentage(condition) => {
                if filtered.is_empty() {
                    0.0
                } else {
                    selected.filter(|r| condition(r)).count() as f64 / matched * 100.0
                }
            }
        };

        SampleEstimate {
            value,
            basis,
            sample_size,
            population,
        }
    }
}

fn project(sum: f64, sample_size: usize, population: usize) -> f64 {
    if sample_size >= population {
        sum
    } else {
        sum / sample_size as f64 * population as f64
    }
}

/// Computes every metric, keeping declaration order.
#[must_use]
pub fn estimate_all<T>(
    metrics: &IndexMap<String, Metric<T>>,
    window: &[T],
    filtered: &[usize],
    population: usize,
) -> IndexMap<String, SampleEstimate> {
    metrics
        .iter()
        .map(|(name, metric)| (name.clone(), metric.estimate(window, filtered, population)))
        .collect()
}
