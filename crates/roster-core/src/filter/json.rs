//! JSON value helpers shared by filter matching, the memory source and the CLI.

use serde_json::Value;
use std::cmp::Ordering;

/// Gets a field from a JSON record, supporting dot notation for nested fields.
#[must_use]
pub fn get_field<'a>(record: &'a Value, field: &str) -> Option<&'a Value> {
    let mut current = record;
    for part in field.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Compares two JSON values for equality.
///
/// Numbers compare numerically (`1` equals `1.0`). A string and a number are
/// equal when the string parses to the same number, since list endpoints are
/// inconsistent about quoting status codes.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(_), Value::Number(_)) => a
            .as_f64()
            .zip(b.as_f64())
            .is_some_and(|(a, b)| (a - b).abs() < f64::EPSILON),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .zip(n.as_f64())
            .is_some_and(|(a, b)| (a - b).abs() < f64::EPSILON),
        (Value::Array(a), Value::Array(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => a == b,
        _ => false,
    }
}

/// Orders two optional field values for sorting.
///
/// A total order over mixed data: missing < null < bool < number < string
/// < array < object. Numeric strings rank and compare as numbers, so `"40"`
/// sorts between `9` and `100`.
#[must_use]
pub fn compare_sort_keys(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (rank_a, rank_b) = (sort_rank(a), sort_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::String(x)), Some(Value::String(y))) if rank_a == 4 => x.cmp(y),
        (Some(x), Some(y)) if rank_a == 3 => {
            let x = as_number(x).unwrap_or(0.0);
            let y = as_number(y).unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Some(x @ (Value::Array(_) | Value::Object(_))), Some(y)) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => Ordering::Equal,
    }
}

fn sort_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(v @ Value::String(_)) if as_number(v).is_some() => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

/// Reads a JSON value as a number, accepting numeric strings.
#[must_use]
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Renders a JSON value for display: strings unquoted, null as `-`.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// Case-insensitive substring search over the given fields of a record.
///
/// With no fields, every string value at the top level of the record is searched.
#[must_use]
pub fn contains_text(record: &Value, fields: &[String], needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    let matches = |value: &Value| match value {
        Value::String(s) => s.to_lowercase().contains(&needle),
        Value::Number(n) => n.to_string().contains(&needle),
        _ => false,
    };

    if fields.is_empty() {
        return match record {
            Value::Object(map) => map.values().any(matches),
            other => matches(other),
        };
    }

    fields
        .iter()
        .filter_map(|field| get_field(record, field))
        .any(matches)
}
