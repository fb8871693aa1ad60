//! Retry policy working together with remote error classification

use catalog_sync::api::resilience::{RetryConfig, RetryPolicy, Retryable, RetryableError};
use catalog_sync::api::RemoteError;
use catalog_sync::config::ImporterConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

async fn attempts_until_done(errors: Vec<RemoteError>, config: RetryConfig) -> (u32, Result<(), RemoteError>) {
    let attempts = AtomicU32::new(0);
    let errors = std::sync::Mutex::new(errors.into_iter());
    let result = RetryPolicy::new(config)
        .execute("test call", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            let next = errors.lock().unwrap().next();
            async move {
                match next {
                    Some(error) => Err(error),
                    None => Ok(()),
                }
            }
        })
        .await;
    (attempts.load(Ordering::SeqCst), result)
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let (attempts, result) = attempts_until_done(
        vec![RemoteError::http(502, "Bad Gateway"), RemoteError::Connection("reset".into())],
        RetryConfig::immediate(3),
    )
    .await;
    assert!(result.is_ok());
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn test_permanent_errors_are_not_retried() {
    let (attempts, result) = attempts_until_done(
        vec![RemoteError::http(409, "Duplicate entry")],
        RetryConfig::immediate(5),
    )
    .await;
    assert_eq!(attempts, 1);
    assert_eq!(result.unwrap_err().status(), Some(409));
}

#[tokio::test]
async fn test_budget_exhausted_returns_last_error() {
    let (attempts, result) = attempts_until_done(
        vec![RemoteError::Timeout, RemoteError::http(429, "Too Many Requests"), RemoteError::Timeout],
        RetryConfig::immediate(2),
    )
    .await;
    assert_eq!(attempts, 2);
    assert_eq!(result.unwrap_err().retry_class(), RetryableError::RateLimited);
}

#[test]
fn test_config_drives_retry_and_timeout() {
    let config = ImporterConfig {
        max_retries: 5,
        request_timeout: 12,
        ..ImporterConfig::default()
    };
    assert_eq!(config.retry_config().max_attempts, 5);
    assert_eq!(config.request_timeout(), Duration::from_secs(12));

    let policy = RetryPolicy::new(RetryConfig {
        jitter: false,
        ..config.retry_config()
    });
    assert_eq!(policy.calculate_delay(1), Duration::from_millis(500));
    assert_eq!(policy.calculate_delay(3), Duration::from_secs(2));
}

#[test]
fn test_auth_errors_are_permanent() {
    assert!(!RemoteError::http(401, "Invalid token").is_transient());
    assert!(RemoteError::http(503, "Maintenance").is_transient());
    assert!(RemoteError::Timeout.is_transient());
}
