//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::SummarizePageParams;
use crate::tools::{cache, summarize_page::summarize_impl};

use pagegist_client::{LiveDocument, SummaryPipeline};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for pagegist.
#[derive(Clone)]
pub struct PagegistServer {
    tool_router: ToolRouter<Self>,
    pipeline: SummaryPipeline,
    #[cfg(feature = "render")]
    browser: Option<pagegist_client::HeadlessBrowser>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl PagegistServer {
    /// Create a new server handler over `pipeline`.
    pub fn new(pipeline: SummaryPipeline) -> Self {
        Self {
            tool_router: Self::tool_router(),
            pipeline,
            #[cfg(feature = "render")]
            browser: None,
        }
    }

    /// Render pages in `browser` when the caller supplies no page text.
    #[cfg(feature = "render")]
    pub fn with_browser(mut self, browser: pagegist_client::HeadlessBrowser) -> Self {
        self.browser = Some(browser);
        self
    }

    #[cfg(feature = "render")]
    fn rendered_document(&self, url: &str) -> Option<Arc<dyn LiveDocument>> {
        let browser = self.browser.as_ref()?;
        let url = pagegist_client::canonicalize(url).ok()?;
        let doc: Arc<dyn LiveDocument> = Arc::new(browser.open(url));
        Some(doc)
    }

    #[cfg(not(feature = "render"))]
    fn rendered_document(&self, _url: &str) -> Option<Arc<dyn LiveDocument>> {
        None
    }

    /// Summarize a web page into up to three bullets.
    ///
    /// Uses caller-supplied page text when given, otherwise fetches the page
    /// (directly, through the readability proxy, or rendered headless).
    #[tool(
        description = "Summarize a web page into at most three key-point bullets. Pass page_text when the page is already open to skip fetching. Results are cached until the page content changes."
    )]
    async fn summarize_page(&self, params: Parameters<SummarizePageParams>) -> Result<CallToolResult, McpError> {
        let live = if params.0.page_text.is_none() { self.rendered_document(&params.0.url) } else { None };
        summarize_impl(&self.pipeline, live, params.0).await
    }

    /// Report page and summary cache usage.
    #[tool(description = "Report entry counts, capacities and TTLs of the page and summary caches, and in-flight requests.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        cache::status_impl(&self.pipeline).await
    }

    /// Empty both caches.
    #[tool(description = "Clear the page and summary caches so the next request fetches and summarizes again.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        cache::clear_impl(&self.pipeline).await
    }
}

impl ServerHandler for PagegistServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "pagegist".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some("Summarizes web pages into short bullet lists with cached, content-aware results.".into()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
