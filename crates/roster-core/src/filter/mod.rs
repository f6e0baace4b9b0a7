//! Composable list filters.
//!
//! A filter is a name bound to a [`FilterValue`]. The active filters of a list
//! live in a [`FilterSet`]; the caller registers how each name is evaluated
//! against a record in a [`FilterRegistry`]. Filters compose by logical AND.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roster_core::filter::{FilterRegistry, FilterValue};
//!
//! let registry = FilterRegistry::new()
//!     .field("status", |p: &Payment| p.status.into())
//!     .predicate("overdue", |p: &Payment, v: &FilterValue| v.is_truthy() == p.is_overdue());
//! ```

pub mod json;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Sentinel string meaning "no constraint".
pub const ALL: &str = "all";

/// The constraint a named filter applies.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterValue {
    /// No constraint.
    #[default]
    All,
    /// Field must equal the value.
    Exact {
        /// Value to compare against.
        value: Value,
    },
    /// Field must be a number within the inclusive bounds.
    Range {
        /// Lower bound (inclusive).
        min: Option<f64>,
        /// Upper bound (inclusive).
        max: Option<f64>,
    },
}

impl FilterValue {
    /// Creates an equality constraint.
    #[must_use]
    pub fn exact(value: impl Into<Value>) -> Self {
        Self::Exact {
            value: value.into(),
        }
    }

    /// Creates a numeric range constraint. A range with no bounds is `All`.
    #[must_use]
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        if min.is_none() && max.is_none() {
            Self::All
        } else {
            Self::Range { min, max }
        }
    }

    /// Parses user input: `all` or empty, `min..max` (either side optional),
    /// a JSON literal, or otherwise a plain string.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() || input.eq_ignore_ascii_case(ALL) {
            return Self::All;
        }

        if let Some((lo, hi)) = input.split_once("..") {
            let lo = lo.trim();
            let hi = hi.trim();
            let min = lo.parse::<f64>().ok();
            let max = hi.parse::<f64>().ok();
            if (lo.is_empty() || min.is_some()) && (hi.is_empty() || max.is_some()) {
                return Self::range(min, max);
            }
        }

        match serde_json::from_str::<Value>(input) {
            Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => Self::Exact { value },
            _ => Self::exact(input),
        }
    }

    /// Returns true if this value imposes no constraint.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        match self {
            Self::All => true,
            Self::Exact {
                value: Value::String(s),
            } => s.eq_ignore_ascii_case(ALL),
            Self::Range { min, max } => min.is_none() && max.is_none(),
            Self::Exact { .. } => false,
        }
    }

    /// Returns the equality value, if this is an `Exact` constraint.
    #[must_use]
    pub fn as_exact(&self) -> Option<&Value> {
        match self {
            Self::Exact { value } => Some(value),
            _ => None,
        }
    }

    /// Returns true if an `Exact` value reads as "yes" (`true`, non-zero, `"true"`, `"yes"`).
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self.as_exact() {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
            _ => false,
        }
    }

    /// Evaluates the constraint against a field value extracted from a record.
    #[must_use]
    pub fn matches(&self, field: &Value) -> bool {
        match self {
            _ if self.is_unconstrained() => true,
            Self::Exact { value } => json::values_equal(field, value),
            Self::Range { min, max } => json::as_number(field).is_some_and(|n| {
                min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi)
            }),
            Self::All => true,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case(ALL) {
            Self::All
        } else {
            Self::exact(value)
        }
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::exact(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::exact(value)
    }
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::from(s),
            value => Self::Exact { value },
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL),
            Self::Exact { value } => f.write_str(&json::display_value(value)),
            Self::Range { min, max } => {
                if let Some(min) = min {
                    write!(f, "{min}")?;
                }
                f.write_str("..")?;
                if let Some(max) = max {
                    write!(f, "{max}")?;
                }
                Ok(())
            }
        }
    }
}

/// The active filters of a list, keyed by name.
///
/// Unconstrained values are never stored, so two sets that constrain the
/// same names the same way are equal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterSet {
    filters: BTreeMap<String, FilterValue>,
}

impl FilterSet {
    /// Creates an empty filter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a filter. Unconstrained values remove the key.
    ///
    /// Returns true if the set changed.
    pub fn set(&mut self, name: impl Into<String>, value: FilterValue) -> bool {
        let name = name.into();
        if value.is_unconstrained() {
            self.filters.remove(&name).is_some()
        } else if self.filters.get(&name) == Some(&value) {
            false
        } else {
            self.filters.insert(name, value);
            true
        }
    }

    /// Removes every filter. Returns true if any was set.
    pub fn clear(&mut self) -> bool {
        let changed = !self.filters.is_empty();
        self.filters.clear();
        changed
    }

    /// Returns the value for a filter, `All` if unset.
    #[must_use]
    pub fn get(&self, name: &str) -> &FilterValue {
        const UNSET: &FilterValue = &FilterValue::All;
        self.filters.get(name).unwrap_or(UNSET)
    }

    /// Iterates over the constrained filters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of constrained filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns true if no filter is constrained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Evaluates one named filter against a record.
pub type Predicate<T> = Arc<dyn Fn(&T, &FilterValue) -> bool + Send + Sync>;

/// Mapping from filter name to the predicate that evaluates it locally.
pub struct FilterRegistry<T> {
    predicates: BTreeMap<String, Predicate<T>>,
}

impl<T> Default for FilterRegistry<T> {
    fn default() -> Self {
        Self {
            predicates: BTreeMap::new(),
        }
    }
}

impl<T> Clone for FilterRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
        }
    }
}

impl<T> fmt::Debug for FilterRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> FilterRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a predicate for a filter name, replacing any previous one.
    #[must_use]
    pub fn predicate<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T, &FilterValue) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Arc::new(predicate));
        self
    }

    /// Registers a filter that matches the value against a field of the record.
    #[must_use]
    pub fn field<F>(self, name: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.predicate(name, move |record, value| value.matches(&extract(record)))
    }

    /// Returns true if the filter has a local predicate.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Returns true if the record satisfies every constrained filter that has
    /// a local predicate. Filters without one are left to the server.
    #[must_use]
    pub fn matches(&self, record: &T, filters: &FilterSet) -> bool {
        filters.iter().all(|(name, value)| {
            self.predicates
                .get(name)
                .is_none_or(|predicate| predicate(record, value))
        })
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
