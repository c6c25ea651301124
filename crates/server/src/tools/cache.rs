//! Cache-related MCP tools.
//!
//! `cache_status` reports usage of the page and summary caches;
//! `cache_clear` empties both.

use pagegist_client::{CacheStats, SummaryPipeline};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Output from the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    /// Page entries dropped.
    pub pages_cleared: usize,
    /// Summary entries dropped.
    pub summaries_cleared: usize,
}

fn to_result(output: &impl Serialize) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::Serialization(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Implementation of the cache_status tool.
pub async fn status_impl(pipeline: &SummaryPipeline) -> Result<CallToolResult, McpError> {
    let stats: CacheStats = pipeline.cache_stats().await;
    to_result(&stats)
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(pipeline: &SummaryPipeline) -> Result<CallToolResult, McpError> {
    let before = pipeline.cache_stats().await;
    pipeline.clear_caches().await;
    to_result(&CacheClearOutput {
        pages_cleared: before.pages.entries,
        summaries_cleared: before.summaries.entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagegist_core::AppConfig;

    fn json_of(result: &CallToolResult) -> serde_json::Value {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_status_reports_capacities() {
        let pipeline = SummaryPipeline::from_config(&AppConfig::default()).await.unwrap();

        let output = json_of(&status_impl(&pipeline).await.unwrap());
        assert_eq!(output["pages"]["capacity"], 24);
        assert_eq!(output["pages"]["ttl_secs"], 360);
        assert_eq!(output["summaries"]["capacity"], 40);
        assert_eq!(output["summaries"]["entries"], 0);
        assert_eq!(output["in_flight"], 0);
    }

    #[tokio::test]
    async fn test_clear_empty_caches() {
        let pipeline = SummaryPipeline::from_config(&AppConfig::default()).await.unwrap();

        let output = json_of(&clear_impl(&pipeline).await.unwrap());
        assert_eq!(output["pages_cleared"], 0);
        assert_eq!(output["summaries_cleared"], 0);
    }
}
