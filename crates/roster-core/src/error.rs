//! Error types for `roster-core`.
//!
//! Every fallible operation in the engine returns [`Error`]. Fetch failures
//! never escape the engine: they are recorded as a human-readable message and
//! recovered with `retry()`. The variants below are what sources and config
//! loading produce.

use thiserror::Error;

/// Result type alias for roster operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in roster operations.
///
/// Error codes follow the pattern `ROSTER-XXX`.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (ROSTER-001).
    #[error("[ROSTER-001] Configuration error: {0}")]
    Config(String),

    /// The remote source could not be reached or rejected the request (ROSTER-002).
    #[error("[ROSTER-002] Transport error: {0}")]
    Transport(String),

    /// Underlying HTTP client error (ROSTER-003).
    #[error("[ROSTER-003] HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote source is rate limiting; retry after the given number of seconds (ROSTER-004).
    #[error("[ROSTER-004] Rate limited, retry after {0}s")]
    RateLimit(u64),

    /// Remote source refused the credentials (ROSTER-005).
    #[error("[ROSTER-005] Authentication failed: {0}")]
    Authentication(String),

    /// Response body could not be decoded (ROSTER-006).
    #[error("[ROSTER-006] Decode error: {0}")]
    Decode(String),

    /// IO error (ROSTER-007).
    #[error("[ROSTER-007] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A request was built with invalid parameters (ROSTER-008).
    #[error("[ROSTER-008] Invalid request: {0}")]
    InvalidRequest(String),

    /// Remote source answered with an unsuccessful HTTP status (ROSTER-009).
    #[error("[ROSTER-009] HTTP {status}: {message}")]
    Status {
        /// Response status code.
        status: u16,
        /// Source name and response body.
        message: String,
    },
}

impl Error {
    /// Returns the error code (e.g., "ROSTER-002").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "ROSTER-001",
            Self::Transport(_) => "ROSTER-002",
            Self::Http(_) => "ROSTER-003",
            Self::RateLimit(_) => "ROSTER-004",
            Self::Authentication(_) => "ROSTER-005",
            Self::Decode(_) => "ROSTER-006",
            Self::Io(_) => "ROSTER-007",
            Self::InvalidRequest(_) => "ROSTER-008",
            Self::Status { .. } => "ROSTER-009",
        }
    }

    /// Returns true if the error came from talking to the remote source.
    ///
    /// These are the failures the engine surfaces through `error()` and
    /// recovers with `retry()`.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Status { .. }
                | Self::Http(_)
                | Self::RateLimit(_)
                | Self::Authentication(_)
                | Self::Decode(_)
        )
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::Config("x".into()).code(), "ROSTER-001");
        assert_eq!(Error::Transport("x".into()).code(), "ROSTER-002");
        assert_eq!(Error::RateLimit(60).code(), "ROSTER-004");
        assert_eq!(Error::Authentication("x".into()).code(), "ROSTER-005");
        assert_eq!(Error::Decode("x".into()).code(), "ROSTER-006");
        assert_eq!(Error::InvalidRequest("x".into()).code(), "ROSTER-008");
        let status = Error::Status {
            status: 502,
            message: "x".into(),
        };
        assert_eq!(status.code(), "ROSTER-009");
        assert!(status.is_transport());
    }

    #[test]
    fn test_error_display_carries_code() {
        let err = Error::Transport("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "[ROSTER-002] Transport error: connection refused"
        );
    }

    #[test]
    fn test_is_transport() {
        assert!(Error::Transport("x".into()).is_transport());
        assert!(Error::RateLimit(1).is_transport());
        assert!(Error::Decode("x".into()).is_transport());
        assert!(!Error::Config("x".into()).is_transport());
        assert!(!Error::InvalidRequest("x".into()).is_transport());
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Decode(_)));
    }
}
