//! Common utilities shared across sources.
//!
//! HTTP client creation, URL validation, status-to-error mapping and JSON
//! record loading.

use reqwest::Client;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Maximum file size for local record files (100MB).
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Creates a configured HTTP client with timeout.
#[must_use]
pub fn create_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Validates an endpoint URL (http or https only).
pub fn validate_url(url: &str) -> Result<()> {
    let has_valid_scheme = ["http://", "https://"].iter().any(|s| url.starts_with(s));

    if !has_valid_scheme {
        return Err(Error::Config(format!(
            "Invalid URL scheme in '{url}'. Allowed: http, https"
        )));
    }

    if url.len() < 10 {
        return Err(Error::Config(format!("Invalid URL format: {url}")));
    }

    Ok(())
}

/// Maps an unsuccessful HTTP status to an error.
pub fn handle_http_error(status_code: u16, body: &str, source_name: &str) -> Error {
    match status_code {
        429 => Error::RateLimit(60),
        401 | 403 => Error::Authentication(format!("{source_name} auth failed: {body}")),
        _ => Error::Status {
            status: status_code,
            message: format!("{source_name} error: {body}"),
        },
    }
}

/// Loads a JSON array of records from a file.
///
/// `array_path` selects a nested array with dot notation (e.g. `"data.items"`);
/// empty means the root is the array.
pub fn json_records(path: &Path, array_path: &str) -> Result<Vec<Value>> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_FILE_SIZE {
        return Err(Error::InvalidRequest(format!(
            "File '{}' is {size} bytes, larger than the {MAX_FILE_SIZE} byte limit",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let root: Value = serde_json::from_str(&content)?;
    extract_array(root, array_path)
}

fn extract_array(root: Value, array_path: &str) -> Result<Vec<Value>> {
    let mut current = root;
    if !array_path.is_empty() {
        for part in array_path.split('.') {
            current = match current {
                Value::Object(mut map) => map
                    .remove(part)
                    .ok_or_else(|| Error::Decode(format!("Path '{part}' not found")))?,
                _ => return Err(Error::Decode(format!("Path '{part}' not found"))),
            };
        }
    }

    match current {
        Value::Array(records) => Ok(records),
        _ if array_path.is_empty() => Err(Error::Decode(
            "Root JSON is not an array. Specify array_path.".to_string(),
        )),
        _ => Err(Error::Decode(format!("Path '{array_path}' is not an array"))),
    }
}
