//! Summary pipeline: resolve, validate caches, coalesce, summarize, cache.
//!
//! All process-wide state lives in one [`PipelineState`], built once at
//! startup and torn down with [`SummaryPipeline::shutdown`].
//!
//! ### Request flow
//! 1. Canonicalize the URL; failures are `INVALID_INPUT` before any I/O.
//! 2. Join or start the coalesced task for the canonical URL.
//! 3. Page content comes from the page cache or the [`ContentResolver`].
//! 4. A summary that still matches the content is served from cache.
//! 5. Otherwise the engine summarizes (streaming when preferred) and the
//!    record is cached.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pagegist_core::{
    AppConfig, CacheDb, CacheEntry, CacheStore, Error, PageContent, RequestCoalescer, SummaryError, SummaryProgress,
    SummaryRecord,
};
use serde::Serialize;
use url::Url;

use crate::fetch::canonicalize;
use crate::live::LiveDocument;
use crate::resolve::ContentResolver;
use crate::summarize::{SummarizationEngine, parse_bullets};

const PAGES: &str = "pages";
const SUMMARIES: &str = "summaries";

/// Progress listener for one request.
pub type ProgressFn = Arc<dyn Fn(SummaryProgress) + Send + Sync>;

/// Result shared by every caller attached to one coalesced task.
#[derive(Debug, Clone)]
struct Outcome {
    record: SummaryRecord,
    cached: bool,
}

/// Usage of one cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheUsage {
    pub entries: usize,
    pub capacity: usize,
    pub ttl_secs: u64,
}

/// Snapshot of both caches and the coalescer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub pages: CacheUsage,
    pub summaries: CacheUsage,
    pub in_flight: usize,
}

async fn usage<V: Clone>(cache: &CacheStore<V>) -> CacheUsage {
    CacheUsage { entries: cache.len().await, capacity: cache.capacity(), ttl_secs: cache.ttl().as_secs() }
}

/// Everything the pipeline owns.
pub struct PipelineState {
    resolver: ContentResolver,
    engine: SummarizationEngine,
    pages: CacheStore<PageContent>,
    summaries: CacheStore<SummaryRecord>,
    coalescer: RequestCoalescer<Outcome, SummaryError>,
    store: Option<CacheDb>,
    prefer_streaming: bool,
}

impl PipelineState {
    /// State with caches sized from `config` and no persistence.
    pub fn new(resolver: ContentResolver, engine: SummarizationEngine, config: &AppConfig) -> Self {
        Self {
            resolver,
            engine,
            pages: CacheStore::new(PAGES, config.page_cache_capacity, config.page_cache_ttl()),
            summaries: CacheStore::new(SUMMARIES, config.summary_cache_capacity, config.summary_cache_ttl()),
            coalescer: RequestCoalescer::new(),
            store: None,
            prefer_streaming: config.summarizer.prefer_streaming,
        }
    }

    /// Mirror both caches into `store`.
    pub fn with_store(mut self, store: CacheDb) -> Self {
        self.store = Some(store);
        self
    }

    /// Put `value` in `cache` and mirror the change to the store, if any.
    /// Persistence failures are logged and otherwise ignored.
    async fn remember<V: Clone + Serialize>(&self, cache: &CacheStore<V>, key: &str, value: V) {
        let Some(store) = &self.store else {
            cache.put(key, value).await;
            return;
        };

        let entry = CacheEntry::new(value.clone());
        let evicted = cache.put(key, value).await;
        if let Err(e) = store.save_entry(cache.name(), key, &entry).await {
            tracing::warn!(cache = cache.name(), key, error = %e, "failed to persist cache entry");
        }
        if let Err(e) = store.delete_entries(cache.name(), &evicted).await {
            tracing::warn!(cache = cache.name(), error = %e, "failed to delete evicted cache entries");
        }
    }

    async fn produce(
        &self, url: Url, live: Option<Arc<dyn LiveDocument>>, on_progress: Option<ProgressFn>,
    ) -> Result<Outcome, Error> {
        let key = url.as_str();
        let emit = |progress: SummaryProgress| {
            if let Some(on_progress) = &on_progress {
                on_progress(progress);
            }
        };

        let content = match self.pages.get(key).await {
            Some(content) => content,
            None => {
                let content = self.resolver.resolve(&url, live.as_deref()).await?;
                tracing::debug!(
                    url = key,
                    source = %content.source,
                    score = ?content.score,
                    fingerprint = %content.fingerprint,
                    "resolved page content"
                );
                self.remember(&self.pages, key, content.clone()).await;
                content
            }
        };

        if let Some(record) = self.summaries.get_if(key, |s| s.matches(&content)).await {
            emit(SummaryProgress::finished(&record, true));
            return Ok(Outcome { record, cached: true });
        }

        let context = Some(content.title.as_str()).filter(|t| !t.trim().is_empty());
        let raw = if self.prefer_streaming {
            let source = content.source;
            let on_partial = |bullets: &[String], raw: &str| emit(SummaryProgress::partial(bullets, raw, source));
            self.engine.summarize_streaming(&content.text, context, &on_partial).await?
        } else {
            self.engine.summarize(&content.text, context).await?
        };

        let bullets = parse_bullets(&raw);
        if bullets.is_empty() {
            return Err(Error::SummarizationFailed("summary contained no bullets".into()));
        }

        let record = SummaryRecord::from_content(&content, bullets, raw);
        self.remember(&self.summaries, key, record.clone()).await;
        tracing::debug!(url = key, bullets = record.bullets.len(), "summary produced");
        emit(SummaryProgress::finished(&record, false));
        Ok(Outcome { record, cached: false })
    }
}

/// Cheap, cloneable handle over the shared [`PipelineState`].
#[derive(Clone)]
pub struct SummaryPipeline {
    state: Arc<PipelineState>,
}

impl SummaryPipeline {
    pub fn new(state: PipelineState) -> Self {
        Self { state: Arc::new(state) }
    }

    /// Build the HTTP-backed pipeline described by `config`, restoring
    /// persisted cache entries when persistence is enabled.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let resolver = ContentResolver::from_config(config)?;
        let engine = SummarizationEngine::from_config(config)?;
        let mut state = PipelineState::new(resolver, engine, config);
        if config.persist_cache {
            state = state.with_store(CacheDb::open(&config.db_path).await?);
        }

        let pipeline = Self::new(state);
        pipeline.restore().await?;
        Ok(pipeline)
    }

    /// Summarize `url`, reporting progress to `on_progress`.
    ///
    /// Concurrent calls for the same canonical URL share one task. The
    /// caller that starts it receives every progress event; callers that
    /// join it receive a single `done` event with the shared result.
    pub async fn request_summary(
        &self, url: &str, live: Option<Arc<dyn LiveDocument>>, on_progress: Option<ProgressFn>,
    ) -> Result<SummaryRecord, SummaryError> {
        let url = canonicalize(url).map_err(Error::from)?;
        let key = url.to_string();

        let started = Arc::new(AtomicBool::new(false));
        let result = {
            let state = Arc::clone(&self.state);
            let started = Arc::clone(&started);
            let progress = on_progress.clone();
            self.state
                .coalescer
                .run(&key, move || {
                    started.store(true, Ordering::SeqCst);
                    async move { state.produce(url, live, progress).await.map_err(SummaryError::from) }
                })
                .await
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(url = %key, error = %e, "summary request failed");
                return Err(e);
            }
        };

        if !started.load(Ordering::SeqCst)
            && let Some(on_progress) = &on_progress
        {
            on_progress(SummaryProgress::finished(&outcome.record, outcome.cached));
        }
        Ok(outcome.record)
    }

    /// Load persisted entries into both caches, dropping rows that no longer fit.
    pub async fn restore(&self) -> Result<(), Error> {
        let state = &self.state;
        let Some(store) = &state.store else {
            return Ok(());
        };

        let pages = store.load_entries::<PageContent>(PAGES).await?;
        let page_count = pages.len();
        let dropped = state.pages.restore(pages).await;
        store.delete_entries(PAGES, &dropped).await?;

        let summaries = store.load_entries::<SummaryRecord>(SUMMARIES).await?;
        let summary_count = summaries.len();
        let dropped = state.summaries.restore(summaries).await;
        store.delete_entries(SUMMARIES, &dropped).await?;

        tracing::info!(pages = page_count, summaries = summary_count, "restored persisted cache");
        Ok(())
    }

    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            pages: usage(&self.state.pages).await,
            summaries: usage(&self.state.summaries).await,
            in_flight: self.state.coalescer.in_flight(),
        }
    }

    /// Empty both caches, including their persisted copies.
    pub async fn clear_caches(&self) {
        let state = &self.state;
        state.pages.clear().await;
        state.summaries.clear().await;
        if let Some(store) = &state.store {
            for namespace in [PAGES, SUMMARIES] {
                if let Err(e) = store.clear_namespace(namespace).await {
                    tracing::warn!(namespace, error = %e, "failed to clear persisted cache");
                }
            }
        }
        tracing::info!("caches cleared");
    }

    /// Flush recency to the store, clear both caches and close the backend session.
    pub async fn shutdown(&self) {
        let state = &self.state;
        if let Some(store) = &state.store {
            if let Err(e) = store.save_entries(PAGES, &state.pages.entries().await).await {
                tracing::warn!(error = %e, "failed to flush page cache");
            }
            if let Err(e) = store.save_entries(SUMMARIES, &state.summaries.entries().await).await {
                tracing::warn!(error = %e, "failed to flush summary cache");
            }
        }
        state.pages.clear().await;
        state.summaries.clear().await;
        state.engine.close().await;
        tracing::info!("pipeline shut down");
    }
}
