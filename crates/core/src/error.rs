//! Error types for pagegist.
//!
//! [`Error`] is the internal taxonomy used by every layer below the
//! pipeline. [`SummaryError`] is what callers of the pipeline see: four
//! kinds, a single message string each, and cheap to clone so one outcome
//! can be handed to every caller attached to a coalesced request.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Internal error type shared by the fetch, extraction, summarization and cache layers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// URL could not be canonicalized.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// No content source produced usable text.
    #[error("CONTENT_UNAVAILABLE: {0}")]
    ContentUnavailable(String),

    /// Response media type is not something we can read as text.
    #[error("UNSUPPORTED_CONTENT_TYPE: {0}")]
    UnsupportedContentType(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// HTTP error response or transport failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// The live document accessor failed.
    #[error("LIVE_DOCUMENT_FAILED: {0}")]
    LiveDocument(String),

    /// Summarization backend is not installed or not ready.
    #[error("SUMMARIZER_UNAVAILABLE: {0}")]
    SummarizerUnavailable(String),

    /// Summarization backend call failed.
    #[error("SUMMARIZATION_FAILED: {0}")]
    SummarizationFailed(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A persisted cache record could not be encoded or decoded.
    #[error("CACHE_ERROR: invalid record: {0}")]
    InvalidRecord(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidRecord(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        SummaryError::from(err).into()
    }
}

/// Errors surfaced at the pipeline boundary.
///
/// Everything that is not one of the first three kinds is reported as
/// `SummarizationFailed` with the internal error's message as the reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummaryError {
    /// Missing or malformed URL. Never retried.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No source produced usable text.
    #[error("CONTENT_UNAVAILABLE: {0}")]
    ContentUnavailable(String),

    /// Backend not installed or not ready.
    #[error("SUMMARIZER_UNAVAILABLE: {0}")]
    SummarizerUnavailable(String),

    /// Backend call failed after content was resolved.
    #[error("SUMMARIZATION_FAILED: {0}")]
    SummarizationFailed(String),
}

impl SummaryError {
    /// The bare reason, without the code prefix.
    pub fn reason(&self) -> &str {
        match self {
            SummaryError::InvalidInput(msg)
            | SummaryError::ContentUnavailable(msg)
            | SummaryError::SummarizerUnavailable(msg)
            | SummaryError::SummarizationFailed(msg) => msg,
        }
    }
}

impl From<Error> for SummaryError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput(msg) | Error::InvalidUrl(msg) => SummaryError::InvalidInput(msg),
            Error::ContentUnavailable(msg) => SummaryError::ContentUnavailable(msg),
            Error::SummarizerUnavailable(msg) => SummaryError::SummarizerUnavailable(msg),
            Error::SummarizationFailed(msg) => SummaryError::SummarizationFailed(msg),
            other => SummaryError::SummarizationFailed(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for SummaryError {
    fn from(err: tokio::task::JoinError) -> Self {
        SummaryError::SummarizationFailed(format!("summary task did not complete: {err}"))
    }
}

impl From<SummaryError> for McpError {
    fn from(err: SummaryError) -> Self {
        let code = match &err {
            SummaryError::InvalidInput(_) => -32602,
            SummaryError::ContentUnavailable(_) => -32001,
            SummaryError::SummarizerUnavailable(_) => -32002,
            SummaryError::SummarizationFailed(_) => -32003,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ContentUnavailable("https://example.com".to_string());
        assert!(err.to_string().contains("CONTENT_UNAVAILABLE"));
        assert!(err.to_string().contains("https://example.com"));
    }

    #[test]
    fn test_taxonomy_passes_through() {
        assert_eq!(
            SummaryError::from(Error::InvalidUrl("bad".into())),
            SummaryError::InvalidInput("bad".into())
        );
        assert_eq!(
            SummaryError::from(Error::ContentUnavailable("none".into())),
            SummaryError::ContentUnavailable("none".into())
        );
        assert_eq!(
            SummaryError::from(Error::SummarizerUnavailable("missing".into())),
            SummaryError::SummarizerUnavailable("missing".into())
        );
    }

    #[test]
    fn test_internal_errors_wrapped_as_summarization_failed() {
        let err = SummaryError::from(Error::HttpError("status 502".into()));
        assert!(matches!(&err, SummaryError::SummarizationFailed(reason) if reason.contains("status 502")));

        let err = SummaryError::from(Error::MigrationFailed("boom".into()));
        assert!(matches!(err, SummaryError::SummarizationFailed(_)));
    }

    #[test]
    fn test_reason_strips_code() {
        let err = SummaryError::SummarizationFailed("backend exploded".into());
        assert_eq!(err.reason(), "backend exploded");
        assert_eq!(err.to_string(), "SUMMARIZATION_FAILED: backend exploded");
    }

    #[test]
    fn test_summary_error_to_mcp_error() {
        let mcp_err: McpError = SummaryError::ContentUnavailable("x".into()).into();
        assert_eq!(mcp_err.code.0, -32001);

        let mcp_err: McpError = Error::InvalidInput("url cannot be empty".into()).into();
        assert_eq!(mcp_err.code.0, -32602);
    }
}
