//! Shared HTTP client utilities

use crate::{EgressError, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds.
    /// Aggregations over large history tables can take tens of seconds.
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum number of idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Maximum number of retries for transient errors
    pub max_retries: u32,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 8,
            max_retries: 3,
            user_agent: format!("ReplyRate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Create a configured HTTP client with connection pooling
pub fn create_client(config: &HttpClientConfig) -> Result<Client> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        // Expire idle connections before the backend closes them
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(&config.user_agent)
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(|e| EgressError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Retry policy for transient errors.
///
/// Backs off 100ms, 200ms, 400ms, ...; a rate limit with `Retry-After`
/// waits at least as long as the server asked.
pub async fn with_retry<F, Fut, T>(max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = retry_delay(attempt, last_error.as_ref());
            debug!(
                "Retrying request after {:?} (attempt {}/{})",
                delay, attempt, max_retries
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if is_retryable(&e) && attempt < max_retries {
                    warn!(
                        "Request failed (attempt {}/{}): {}",
                        attempt + 1,
                        max_retries + 1,
                        e
                    );
                    last_error = Some(e);
                } else {
                    return Err(e);
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| EgressError::ConfigError("Retry loop exited unexpectedly".to_string())))
}

fn retry_delay(attempt: u32, last_error: Option<&EgressError>) -> Duration {
    let backoff = Duration::from_millis(2u64.pow(attempt.saturating_sub(1)) * 100);
    match last_error {
        Some(EgressError::RateLimitExceeded {
            retry_after_secs: Some(secs),
        }) => backoff.max(Duration::from_secs(*secs)),
        _ => backoff,
    }
}

fn is_retryable(err: &EgressError) -> bool {
    match err {
        EgressError::HttpError(req_err) => {
            req_err.is_connect() || req_err.is_timeout() || req_err.is_request()
        }
        EgressError::BackendError { status_code, .. } => {
            matches!(status_code, 500 | 502 | 503 | 504)
        }
        EgressError::RateLimitExceeded { .. } | EgressError::Timeout(_) => true,
        _ => false,
    }
}

/// Map a non-success response to an error, consuming the body
pub async fn error_from_response(response: reqwest::Response) -> EgressError {
    let status_code = response.status().as_u16();
    let retry_after_secs = retry_after(response.headers());
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());

    match status_code {
        401 | 403 => EgressError::Unauthorized(message),
        429 => EgressError::RateLimitExceeded { retry_after_secs },
        _ => EgressError::BackendError {
            status_code,
            message,
        },
    }
}

fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

/// Parse a `retry-after` value: delay in seconds or an HTTP date.
///
/// Dates in the past map to `Some(0)`.
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    if let Ok(seconds) = header_value.trim().parse::<u64>() {
        return Some(seconds);
    }

    let target_time = chrono::DateTime::parse_from_rfc2822(header_value.trim()).ok()?;
    let seconds = target_time
        .signed_duration_since(chrono::Utc::now())
        .num_seconds();
    debug!(retry_after_seconds = seconds, "Parsed retry-after header (HTTP-date format)");
    Some(seconds.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.max_retries, 3);
        assert!(config.user_agent.starts_with("ReplyRate/"));
    }

    #[test]
    fn test_create_client() {
        let config = HttpClientConfig::default();
        assert!(create_client(&config).is_ok());
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let result = with_retry(3, || async { Ok::<i32, EgressError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_non_retryable_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result = with_retry(3, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, EgressError>(EgressError::Unauthorized("nope".to_string()))
            }
        })
        .await;

        assert!(matches!(result, Err(EgressError::Unauthorized(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_transient_then_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result = with_retry(3, || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(EgressError::BackendError {
                        status_code: 503,
                        message: "busy".to_string(),
                    })
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_retries() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result = with_retry(2, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, EgressError>(EgressError::Timeout(60))
            }
        })
        .await;

        assert!(matches!(result, Err(EgressError::Timeout(60))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_for_retry_after() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let started = tokio::time::Instant::now();
        let result = with_retry(3, || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(EgressError::RateLimitExceeded {
                        retry_after_secs: Some(5),
                    })
                } else {
                    Ok(1)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn test_retry_delay() {
        assert_eq!(retry_delay(1, None), Duration::from_millis(100));
        assert_eq!(retry_delay(3, None), Duration::from_millis(400));

        let limited = EgressError::RateLimitExceeded {
            retry_after_secs: Some(2),
        };
        assert_eq!(retry_delay(1, Some(&limited)), Duration::from_secs(2));

        // Backoff wins when it is already longer
        let immediate = EgressError::RateLimitExceeded {
            retry_after_secs: Some(0),
        };
        assert_eq!(retry_delay(2, Some(&immediate)), Duration::from_millis(200));

        let unknown = EgressError::RateLimitExceeded {
            retry_after_secs: None,
        };
        assert_eq!(retry_delay(1, Some(&unknown)), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("60"), Some(60));
        assert_eq!(parse_retry_after("  5  "), Some(5));
        assert_eq!(parse_retry_after("invalid"), None);
        assert_eq!(parse_retry_after(""), None);

        let past = chrono::Utc::now() - chrono::Duration::seconds(60);
        assert_eq!(parse_retry_after(&past.to_rfc2822()), Some(0));

        let future = chrono::Utc::now() + chrono::Duration::seconds(120);
        let seconds = parse_retry_after(&future.to_rfc2822()).unwrap();
        assert!((118..=120).contains(&seconds), "got {}", seconds);
    }

    #[test]
    fn test_error_display_formatting() {
        let err = EgressError::ConfigError("bad config".to_string());
        assert!(err.to_string().contains("Invalid configuration"));

        let err = EgressError::Timeout(30);
        assert_eq!(err.to_string(), "Request timeout after 30s");

        let err = EgressError::RateLimitExceeded {
            retry_after_secs: Some(60),
        };
        assert!(err.to_string().contains("60s"));

        let err = EgressError::RateLimitExceeded {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "Rate limit exceeded");
    }
}
