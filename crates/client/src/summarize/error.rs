//! Summarization backend error types.

use pagegist_core::Error;
use std::sync::Arc;

/// Errors from a summarization backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// Backend is not configured, installed or ready.
    #[error("summarizer unavailable: {0}")]
    Unavailable(String),

    /// Authentication failed (invalid API key).
    #[error("authentication failed: invalid API key")]
    Auth,

    /// Rate limited by the backend.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    Http { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Streamed response broke off or was malformed.
    #[error("stream error: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { BackendError::Timeout } else { BackendError::Network(Arc::new(err)) }
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(msg) => Error::SummarizerUnavailable(msg),
            other => Error::SummarizationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert!(BackendError::Auth.to_string().contains("API key"));
        assert_eq!(BackendError::Http { status: 503 }.to_string(), "HTTP error: 503");
    }

    #[test]
    fn test_maps_into_taxonomy() {
        let err: Error = BackendError::Unavailable("no api key".into()).into();
        assert!(matches!(err, Error::SummarizerUnavailable(msg) if msg == "no api key"));

        let err: Error = BackendError::RateLimited.into();
        assert!(matches!(err, Error::SummarizationFailed(msg) if msg.contains("rate limited")));
    }
}
