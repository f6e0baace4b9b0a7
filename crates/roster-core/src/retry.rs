//! Retry logic with exponential backoff for page fetches.
//!
//! A single fetch generation may retry transient failures (timeouts, resets,
//! rate limits, 5xx) before the failure is surfaced to the list view.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each retry).
    pub backoff_multiplier: f64,
    /// Whether to add jitter so many list views don't retry in lockstep.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Creates a config with no retries: the first failure is surfaced.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Calculates the delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.add_jitter {
            // Add up to 25% jitter
            capped_delay + capped_delay * 0.25 * rand_jitter()
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }
}

/// Pseudo-random jitter in `[0.0, 1.0)` from the clock's sub-second nanos.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}

/// Determines if an error is worth retrying automatically.
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::RateLimit(_) | Error::Io(_) => return true,
        Error::Http(e) => return e.is_timeout() || e.is_connect(),
        Error::Authentication(_)
        | Error::Config(_)
        | Error::Decode(_)
        | Error::InvalidRequest(_) => return false,
        Error::Status { status, .. } => return *status >= 500 || *status == 408,
        Error::Transport(_) => {}
    }

    let error_msg = error.to_string().to_lowercase();

    let is_rate_limit = error_msg.contains("429")
        || error_msg.contains("rate limit")
        || error_msg.contains("too many requests");

    let is_transient = error_msg.contains("timeout")
        || error_msg.contains("timed out")
        || error_msg.contains("connection refused")
        || error_msg.contains("connection reset")
        || error_msg.contains("temporary");

    let is_server_error = error_msg.contains("500")
        || error_msg.contains("502")
        || error_msg.contains("503")
        || error_msg.contains("504")
        || error_msg.contains("internal server error")
        || error_msg.contains("bad gateway")
        || error_msg.contains("service unavailable");

    is_rate_limit || is_transient || is_server_error
}

/// Executes an async operation with retry logic.
///
/// Returns the first success, the first non-retryable error, or the last
/// error once all attempts are used.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt);
            debug!(
                "{}: Retry attempt {}/{} after {:?}",
                operation_name, attempt, config.max_retries, delay
            );
            sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{}: Succeeded after {} retries", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) if is_retryable_error(&e) && attempt < config.max_retries => {
                warn!(
                    "{}: Retryable error (attempt {}/{}): {}",
                    operation_name,
                    attempt + 1,
                    max_attempts,
                    e
                );
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_config_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.delay_for_attempt(1), Duration::ZERO);
    }

    #[test]
    fn test_delay_for_attempt_exponential() {
        // Arrange
        let config = RetryConfig {
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(100),
            add_jitter: false,
            ..Default::default()
        };

        // Act & Assert
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(10),
            backoff_multiplier: 10.0,
            max_delay: Duration::from_secs(30),
            add_jitter: false,
            ..Default::default()
        };

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(4),
            add_jitter: true,
            ..Default::default()
        };

        let delay = config.delay_for_attempt(1);
        assert!(delay >= Duration::from_secs(4));
        assert!(delay <= Duration::from_secs(5));
    }

    #[test]
    fn test_client_status_not_retried_whatever_the_body() {
        let err = crate::source::common::handle_http_error(
            404,
            "upstream 500: timeout, temporary outage",
            "List endpoint",
        );

        assert!(!is_retryable_error(&err));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable_error(&Error::RateLimit(60)));
        assert!(is_retryable_error(&Error::Transport(
            "HTTP 503 Service Unavailable".to_string()
        )));
        assert!(is_retryable_error(&Error::Transport(
            "Connection reset by peer".to_string()
        )));
        assert!(!is_retryable_error(&Error::Transport(
            "HTTP 404 Not Found".to_string()
        )));
        assert!(is_retryable_error(&Error::Status {
            status: 503,
            message: "list error: maintenance".to_string()
        }));
        assert!(is_retryable_error(&Error::Status {
            status: 408,
            message: "list error: ".to_string()
        }));
        assert!(!is_retryable_error(&Error::Authentication(
            "HTTP 401 Unauthorized".to_string()
        )));
        assert!(!is_retryable_error(&Error::Decode(
            "missing field `data`".to_string()
        )));
    }

    #[tokio::test]
    async fn test_with_retry_success_after_retries() {
        // Arrange
        let config = RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            add_jitter: false,
            ..Default::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        // Act
        let result = with_retry(&config, "page fetch", || {
            let calls = calls_clone.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::Transport("HTTP 502 Bad Gateway".to_string()))
                } else {
                    Ok::<_, Error>(7)
                }
            }
        })
        .await;

        // Assert
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_max() {
        let config = RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            add_jitter: false,
            ..Default::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<u32> = with_retry(&config, "page fetch", || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Transport("connection refused".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_non_retryable_fails_fast() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(1),
            ..Default::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<u32> = with_retry(&config, "page fetch", || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Authentication("HTTP 401 Unauthorized".to_string()))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Authentication(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
