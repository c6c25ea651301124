//! Client code for pagegist.
//!
//! This crate provides the fetch and proxy clients, content extraction and
//! scoring, content resolution, live-document accessors, the summarization
//! engine, and the [`SummaryPipeline`] that ties them together for the
//! server and CLI.

pub mod extract;
pub mod fetch;
pub mod live;
pub mod pipeline;
pub mod resolve;
pub mod summarize;

pub use extract::{Extraction, Extractor, StructuralExtractor, html_to_text, sanitize, score};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, ProxyClient, canonicalize};
pub use live::{LiveDocument, LiveText, StaticDocument};
pub use pipeline::{CacheStats, CacheUsage, PipelineState, ProgressFn, SummaryPipeline};
pub use resolve::{ContentResolver, PageFetcher, ReadableFetcher};
pub use summarize::{OpenAiBackend, SummarizationEngine, SummarizerBackend, SummarizerSession, parse_bullets};

#[cfg(feature = "render")]
pub use live::{HeadlessBrowser, HeadlessDocument};
