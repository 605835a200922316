//! Error types for the followscout SDK

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur when talking to the follow graph
#[derive(Error, Debug)]
pub enum SdkError {
    /// The requested user does not exist
    #[error("User not found: {0}")]
    NotFound(String),

    /// The API refused the request because the rate limit was hit
    #[error("Rate limit exceeded{}", reset_suffix(.reset_at))]
    RateLimited {
        /// When the current rate-limit window resets, if the server said so
        reset_at: Option<DateTime<Utc>>,
    },

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SdkError {
    /// Whether this error is a rate-limit refusal rather than a generic failure
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SdkError::RateLimited { .. })
    }

    /// Whether this error means the user does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, SdkError::NotFound(_))
    }
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(" (resets at {})", at.to_rfc3339()),
        None => String::new(),
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rate_limit_display_includes_reset() {
        let reset_at = Utc.timestamp_opt(1_700_000_000, 0).single();
        let err = SdkError::RateLimited { reset_at };
        let msg = err.to_string();
        assert!(msg.starts_with("Rate limit exceeded"));
        assert!(msg.contains("2023-11-14"));
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_rate_limit_display_without_reset() {
        let err = SdkError::RateLimited { reset_at: None };
        assert_eq!(err.to_string(), "Rate limit exceeded");
    }

    #[test]
    fn test_not_found_is_not_rate_limit() {
        let err = SdkError::NotFound("ghost".to_string());
        assert!(!err.is_rate_limit());
        assert!(err.is_not_found());
    }
}
