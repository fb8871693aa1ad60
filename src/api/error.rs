//! Errors raised by the remote catalog

use super::resilience::{Retryable, RetryableError};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("cannot read {path}: {message}")]
    File { path: String, message: String },

    /// Refused before sending, e.g. a variant whose template is unusable
    #[error("rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => RemoteError::Auth(message),
            _ => RemoteError::Http { status, message },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Retryable for RemoteError {
    fn retry_class(&self) -> RetryableError {
        match self {
            RemoteError::Connection(_) => RetryableError::Network,
            RemoteError::Timeout => RetryableError::Timeout,
            RemoteError::Auth(_) => RetryableError::AuthError,
            RemoteError::Http { status, .. } => RetryableError::from_status_code(*status),
            RemoteError::InvalidResponse(_) | RemoteError::File { .. } | RemoteError::Rejected(_) => {
                RetryableError::Unknown
            }
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        match RetryableError::from_reqwest_error(&error) {
            RetryableError::Timeout => RemoteError::Timeout,
            RetryableError::Network => RemoteError::Connection(error.to_string()),
            _ => match error.status() {
                Some(status) => RemoteError::http(status.as_u16(), error.to_string()),
                None if error.is_decode() => RemoteError::InvalidResponse(error.to_string()),
                None => RemoteError::Connection(error.to_string()),
            },
        }
    }
}

/// Human readable message from a Frappe error body.
///
/// Looks at `message`, then the first entry of `_server_messages` (a JSON
/// string holding a list of JSON strings), then `exc_type`.
pub fn extract_error_message(status: u16, body: &str) -> String {
    let fallback = || {
        let text = body.trim();
        if text.is_empty() || text.starts_with('<') {
            format!("HTTP {}", status)
        } else {
            text.chars().take(300).collect()
        }
    };

    let Ok(data) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };

    if let Some(message) = data.get("message").and_then(Value::as_str) {
        return message.to_string();
    }

    if let Some(message) = data
        .get("_server_messages")
        .and_then(Value::as_str)
        .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
        .and_then(|messages| messages.into_iter().next())
    {
        return serde_json::from_str::<Value>(&message)
            .ok()
            .and_then(|m| m.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(message);
    }

    if let Some(exc_type) = data.get("exc_type").and_then(Value::as_str) {
        return match exc_type {
            "DuplicateEntryError" => "record already exists".to_string(),
            "ValidationError" => "validation failed, check required fields".to_string(),
            "LinkValidationError" => "linked record not found (category, brand, unit)".to_string(),
            other => format!("remote error: {}", other),
        };
    }

    fallback()
}
