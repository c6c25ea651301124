//! summarize_page tool implementation.
//!
//! Resolves a page and returns its bullet summary through the shared pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pagegist_client::{LiveDocument, ProgressFn, StaticDocument, SummaryPipeline};
use pagegist_core::{ContentSource, SummaryProgress, SummaryRecord};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Input parameters for the summarize_page tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SummarizePageParams {
    /// The URL of the page to summarize.
    pub url: String,

    /// Text of the page when the caller already has it open. When given, no
    /// network fetch is made for the page.
    #[serde(default)]
    pub page_text: Option<String>,

    /// Title to go with `page_text`.
    #[serde(default)]
    pub page_title: Option<String>,
}

/// Output structure for the summarize_page tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SummarizePageOutput {
    /// Canonical URL the summary was produced for.
    pub url: String,
    pub title: String,
    /// Up to three summary bullets.
    pub bullets: Vec<String>,
    /// Where the page text came from: "tab", "network" or "proxy".
    pub source: ContentSource,
    /// Whether the summary was served from cache.
    pub cached: bool,
    /// Content identity the summary was produced from.
    pub fingerprint: String,
    /// RFC 3339 time the summary was produced.
    pub created_at: String,
}

impl SummarizePageOutput {
    fn new(record: SummaryRecord, cached: bool) -> Self {
        Self {
            url: record.url,
            title: record.title,
            bullets: record.bullets,
            source: record.source,
            cached,
            fingerprint: record.fingerprint,
            created_at: record.created_at,
        }
    }
}

/// Caller-supplied page text as a live document.
fn supplied_document(params: &SummarizePageParams) -> Result<Option<Arc<dyn LiveDocument>>, ToolError> {
    match (&params.page_text, &params.page_title) {
        (Some(text), title) => {
            let mut doc = StaticDocument::new(text.clone());
            if let Some(title) = title {
                doc = doc.with_title(title.clone());
            }
            let doc: Arc<dyn LiveDocument> = Arc::new(doc);
            Ok(Some(doc))
        }
        (None, Some(_)) => Err(ToolError::InvalidInput("page_title requires page_text".into())),
        (None, None) => Ok(None),
    }
}

/// Implementation of the summarize_page tool.
///
/// `live` is used when the caller did not supply page text.
pub async fn summarize_impl(
    pipeline: &SummaryPipeline, live: Option<Arc<dyn LiveDocument>>, params: SummarizePageParams,
) -> Result<CallToolResult, McpError> {
    let live = supplied_document(&params)?.or(live);

    // A done event reports whether the record came from cache.
    let cached = Arc::new(AtomicBool::new(false));
    let on_progress: ProgressFn = {
        let cached = Arc::clone(&cached);
        Arc::new(move |progress: SummaryProgress| {
            if progress.done {
                cached.store(progress.cached, Ordering::SeqCst);
            }
        })
    };

    let record = pipeline.request_summary(&params.url, live, Some(on_progress)).await?;
    let output = SummarizePageOutput::new(record, cached.load(Ordering::SeqCst));

    let json = serde_json::to_string_pretty(&output).map_err(|e| ToolError::Serialization(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
