//! Summarization engine over a pluggable backend.
//!
//! The engine owns at most one backend session, created lazily on first use
//! and shared by every request. A session that fails a call is discarded and
//! recreated on the next use.
//!
//! Streaming output is bridged through a bounded channel: a producer task
//! drains the backend stream while the caller-side consumer aggregates text
//! and forwards throttled partial bullets. A stream that breaks off or ends
//! empty is retried once as a one-shot call.

pub mod backend;
pub mod bullets;
pub mod error;
pub mod openai;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use pagegist_core::{AppConfig, Error};
use tokio::sync::{Mutex, mpsc};

pub use backend::{Availability, ChunkStream, SessionOptions, SummarizerBackend, SummarizerSession};
pub use bullets::{MAX_BULLETS, parse_bullets};
pub use error::BackendError;
pub use openai::{OpenAiBackend, OpenAiConfig};

/// Capacity of the chunk channel between the stream producer and consumer.
const CHUNK_CHANNEL_CAPACITY: usize = 32;

/// Receives `(bullets, raw)` snapshots while a streaming summary runs.
pub type PartialFn<'a> = &'a (dyn Fn(&[String], &str) + Send + Sync);

/// Fold a chunk into the running buffer.
fn accumulate(buffer: &mut String, chunk: &str, cumulative: bool) {
    if cumulative {
        buffer.clear();
    }
    buffer.push_str(chunk);
}

/// Wraps a [`SummarizerBackend`] with session memoization and streaming.
pub struct SummarizationEngine {
    backend: Arc<dyn SummarizerBackend>,
    options: SessionOptions,
    session: Mutex<Option<Arc<dyn SummarizerSession>>>,
    throttle: Duration,
}

impl SummarizationEngine {
    pub fn new(backend: Arc<dyn SummarizerBackend>, options: SessionOptions, throttle: Duration) -> Self {
        Self { backend, options, session: Mutex::new(None), throttle }
    }

    /// Engine over the OpenAI-compatible backend described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let backend = OpenAiBackend::new(OpenAiConfig::from(&config.summarizer))?;
        Ok(Self::new(Arc::new(backend), SessionOptions::from(&config.summarizer), config.stream_throttle()))
    }

    /// The memoized session, creating it if needed.
    ///
    /// The lock is held across creation, so concurrent callers wait for the
    /// one in-flight creation instead of starting their own.
    async fn session(&self) -> Result<Arc<dyn SummarizerSession>, Error> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(session));
        }

        match self.backend.availability().await {
            Availability::Unavailable => {
                return Err(Error::SummarizerUnavailable("summarization backend is not available".into()));
            }
            Availability::Downloadable => {
                tracing::info!("summarization model needs a download; creating session anyway");
            }
            Availability::Available => {}
        }

        let session = self.backend.create_session(&self.options).await?;
        tracing::debug!("summarizer session created");
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Drop `failed` if it is still the memoized session, so the next call
    /// creates a fresh one. A session created after it is left alone.
    async fn discard(&self, failed: &Arc<dyn SummarizerSession>) {
        let mut slot = self.session.lock().await;
        if !slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, failed)) {
            return;
        }
        slot.take();
        drop(slot);

        tracing::warn!("discarding summarizer session after failure");
        failed.close().await;
    }

    /// One-shot summary of `text`.
    pub async fn summarize(&self, text: &str, context: Option<&str>) -> Result<String, Error> {
        let session = self.session().await?;
        self.one_shot(&session, text, context).await
    }

    async fn one_shot(
        &self, session: &Arc<dyn SummarizerSession>, text: &str, context: Option<&str>,
    ) -> Result<String, Error> {
        match session.summarize(text, context).await {
            Ok(raw) => Ok(raw),
            Err(e) => {
                self.discard(session).await;
                Err(e.into())
            }
        }
    }

    /// Streaming summary of `text`, reporting partial bullets to `on_partial`.
    ///
    /// A snapshot is emitted when the bullet count grows or the throttle
    /// interval has passed since the last emission, and only when there is at
    /// least one bullet. Sessions without streaming support, broken streams
    /// and empty streams all fall back to [`Self::summarize`].
    pub async fn summarize_streaming(
        &self, text: &str, context: Option<&str>, on_partial: PartialFn<'_>,
    ) -> Result<String, Error> {
        let session = self.session().await?;
        if !session.supports_streaming() {
            return self.one_shot(&session, text, context).await;
        }

        let stream = match session.summarize_streaming(text, context).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "streaming summary could not start, using one-shot");
                return self.one_shot(&session, text, context).await;
            }
        };

        match self.consume(stream, session.cumulative_chunks(), on_partial).await {
            Ok(raw) if !raw.trim().is_empty() => Ok(raw),
            Ok(_) => {
                tracing::warn!("streaming summary was empty, using one-shot");
                self.one_shot(&session, text, context).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "streaming summary failed, using one-shot");
                self.one_shot(&session, text, context).await
            }
        }
    }

    async fn consume(
        &self, mut stream: ChunkStream, cumulative: bool, on_partial: PartialFn<'_>,
    ) -> Result<String, BackendError> {
        let (tx, mut rx) = mpsc::channel::<Result<String, BackendError>>(CHUNK_CHANNEL_CAPACITY);
        let producer = tokio::spawn(async move {
            while let Some(chunk) = stream.next().await {
                let failed = chunk.is_err();
                if tx.send(chunk).await.is_err() || failed {
                    break;
                }
            }
        });

        let mut buffer = String::new();
        let mut emitted_count = 0usize;
        let mut last_emit: Option<Instant> = None;
        let mut outcome = Ok(());

        while let Some(chunk) = rx.recv().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            };
            accumulate(&mut buffer, &chunk, cumulative);

            let bullets = parse_bullets(&buffer);
            let grew = bullets.len() > emitted_count;
            let elapsed = last_emit.is_none_or(|at| at.elapsed() >= self.throttle);
            if !bullets.is_empty() && (grew || elapsed) {
                tracing::trace!(bullets = bullets.len(), "streaming partial summary");
                on_partial(&bullets, &buffer);
                emitted_count = bullets.len();
                last_emit = Some(Instant::now());
            }
        }

        drop(rx);
        if let Err(e) = producer.await {
            return Err(BackendError::Stream(format!("stream producer failed: {e}")));
        }
        outcome.map(|()| buffer)
    }

    /// Close and forget the session, if any.
    pub async fn close(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.close().await;
        }
    }
}
