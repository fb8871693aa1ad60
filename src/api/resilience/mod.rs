//! Retry handling for remote calls

pub mod retry;

pub use retry::{Retryable, RetryConfig, RetryPolicy, RetryableError};
