//! Pluggable summarization backend capability.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use pagegist_core::{SummarizerConfig, SummaryFormat, SummaryKind, SummaryLength};

use super::BackendError;

/// Text chunks produced by a streaming summary. Deltas unless the session
/// reports [`SummarizerSession::cumulative_chunks`].
pub type ChunkStream = BoxStream<'static, Result<String, BackendError>>;

/// Whether a backend can serve requests right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// Usable after a model download, which session creation triggers.
    Downloadable,
    Unavailable,
}

/// Style configuration fixed for the life of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub kind: SummaryKind,
    pub format: SummaryFormat,
    pub length: SummaryLength,
    /// Context shared by every summary produced in the session.
    pub shared_context: Option<String>,
}

impl From<&SummarizerConfig> for SessionOptions {
    fn from(config: &SummarizerConfig) -> Self {
        Self {
            kind: config.kind,
            format: config.format,
            length: config.length,
            shared_context: config.shared_context.clone(),
        }
    }
}

/// A summarization capability that hands out sessions.
#[async_trait]
pub trait SummarizerBackend: Send + Sync {
    async fn availability(&self) -> Availability;

    async fn create_session(&self, options: &SessionOptions) -> Result<Arc<dyn SummarizerSession>, BackendError>;
}

/// A configured backend session.
#[async_trait]
pub trait SummarizerSession: Send + Sync {
    /// One-shot summary of `text`.
    async fn summarize(&self, text: &str, context: Option<&str>) -> Result<String, BackendError>;

    /// Incremental summary of `text`.
    async fn summarize_streaming(&self, text: &str, context: Option<&str>) -> Result<ChunkStream, BackendError>;

    fn supports_streaming(&self) -> bool {
        true
    }

    /// Whether each streamed chunk is the whole response so far rather than
    /// a delta.
    fn cumulative_chunks(&self) -> bool {
        false
    }

    /// Release backend resources. The session is not used afterwards.
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_options_from_config() {
        let config = SummarizerConfig {
            length: SummaryLength::Medium,
            kind: SummaryKind::Tldr,
            shared_context: Some("news".into()),
            ..Default::default()
        };
        let options = SessionOptions::from(&config);
        assert_eq!(options.kind, SummaryKind::Tldr);
        assert_eq!(options.format, SummaryFormat::Markdown);
        assert_eq!(options.length, SummaryLength::Medium);
        assert_eq!(options.shared_context.as_deref(), Some("news"));
    }
}
