//! Tests for config module

use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

// ========================================================================
// Defaults
// ========================================================================

#[test]
fn test_config_default_values() {
    // Arrange & Act
    let config = EngineConfig::default();

    // Assert
    assert_eq!(config.list.debounce_ms, 500);
    assert_eq!(config.list.page_size, 10);
    assert_eq!(config.list.max_visible_pages, 5);
    assert_eq!(config.fetch.window_size, 1000);
    assert_eq!(config.fetch.timeout_secs, 30);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, "text");
}

#[test]
fn test_default_config_is_valid() {
    assert!(EngineConfig::default().validate().is_ok());
}

#[test]
fn test_debounce_delay_duration() {
    let config = EngineConfig::default();
    assert_eq!(config.debounce_delay(), Duration::from_millis(500));
}

#[test]
fn test_retry_config_from_fetch_section() {
    // Arrange
    let fetch = FetchConfig {
        max_retries: 4,
        initial_backoff_ms: 50,
        max_backoff_ms: 800,
        ..FetchConfig::default()
    };

    // Act
    let retry = fetch.retry_config();

    // Assert
    assert_eq!(retry.max_retries, 4);
    assert_eq!(retry.initial_delay, Duration::from_millis(50));
    assert_eq!(retry.max_delay, Duration::from_millis(800));
}

// ========================================================================
// TOML parsing
// ========================================================================

#[test]
fn test_from_toml_partial_override() {
    // Arrange
    let toml_str = r#"
[list]
page_size = 25

[fetch]
window_size = 500
"#;

    // Act
    let config = EngineConfig::from_toml(toml_str).expect("parse");

    // Assert
    assert_eq!(config.list.page_size, 25);
    assert_eq!(config.list.debounce_ms, 500);
    assert_eq!(config.fetch.window_size, 500);
    assert_eq!(config.fetch.timeout_secs, 30);
}

#[test]
fn test_from_toml_invalid_type() {
    let result = EngineConfig::from_toml("[list]\npage_size = \"many\"\n");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_load_from_path() {
    // Arrange
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "[list]\ndebounce_ms = 250\nmax_visible_pages = 7").expect("write");

    // Act
    let config = EngineConfig::load_from_path(file.path()).expect("load");

    // Assert
    assert_eq!(config.list.debounce_ms, 250);
    assert_eq!(config.list.max_visible_pages, 7);
}

#[test]
fn test_load_from_missing_path_uses_defaults() {
    let config = EngineConfig::load_from_path("/nonexistent/roster.toml").expect("load");
    assert_eq!(config.list.page_size, 10);
}

#[test]
fn test_to_toml_roundtrip() {
    // Arrange
    let mut config = EngineConfig::default();
    config.list.page_size = 50;
    config.fetch.max_retries = 0;

    // Act
    let toml_str = config.to_toml().expect("serialize");
    let parsed = EngineConfig::from_toml(&toml_str).expect("parse");

    // Assert
    assert_eq!(parsed, config);
}

// ========================================================================
// Validation
// ========================================================================

#[test]
fn test_validate_rejects_zero_page_size() {
    let mut config = EngineConfig::default();
    config.list.page_size = 0;

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("list.page_size"));
}

#[test]
fn test_validate_rejects_even_visible_pages() {
    let mut config = EngineConfig::default();
    config.list.max_visible_pages = 4;

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("list.max_visible_pages"));
}

#[test]
fn test_validate_rejects_small_visible_pages() {
    let mut config = EngineConfig::default();
    config.list.max_visible_pages = 1;

    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_huge_visible_pages() {
    let mut config = EngineConfig::default();
    config.list.max_visible_pages = MAX_VISIBLE_PAGES;
    assert!(config.validate().is_ok());

    config.list.max_visible_pages = 2_000_000_001;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("list.max_visible_pages"));
}

#[test]
fn test_validate_rejects_window_out_of_range() {
    let mut config = EngineConfig::default();
    config.fetch.window_size = 0;
    assert!(config.validate().is_err());

    config.fetch.window_size = MAX_WINDOW_SIZE + 1;
    assert!(config.validate().is_err());

    config.fetch.window_size = MAX_WINDOW_SIZE;
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_unknown_log_level() {
    let mut config = EngineConfig::default();
    config.logging.level = "loud".to_string();

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("logging.level"));
}

#[test]
fn test_validate_rejects_unknown_log_format() {
    let mut config = EngineConfig::default();
    config.logging.format = "xml".to_string();

    assert!(config.validate().is_err());
}
