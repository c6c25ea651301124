//! pagegist server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use pagegist_client::SummaryPipeline;
use pagegist_core::AppConfig;
use pagegist_core::config::DEFAULT_SUMMARIZER_BASE_URL;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        proxy = config.proxy_enabled,
        render = config.render_enabled,
        persist_cache = config.persist_cache,
        model = %config.summarizer.model,
        "Starting pagegist server on stdio transport"
    );
    if config.summarizer.base_url == DEFAULT_SUMMARIZER_BASE_URL
        && let Err(e) = config.require_summarizer_api_key()
    {
        tracing::warn!("{e}");
    }

    let pipeline = SummaryPipeline::from_config(&config).await?;
    let handler = build_handler(&config, pipeline.clone()).await;

    let transport = stdio();
    let server = serve_server(handler, transport).await?;
    server.waiting().await?;
    tracing::info!("server stopped");

    pipeline.shutdown().await;
    Ok(())
}

#[cfg(feature = "render")]
async fn build_handler(config: &AppConfig, pipeline: SummaryPipeline) -> handler::PagegistServer {
    let handler = handler::PagegistServer::new(pipeline);
    if !config.render_enabled {
        return handler;
    }

    match pagegist_client::HeadlessBrowser::launch(config.timeout() * 5).await {
        Ok(browser) => handler.with_browser(browser),
        Err(e) => {
            tracing::warn!(error = %e, "headless rendering disabled");
            handler
        }
    }
}

#[cfg(not(feature = "render"))]
async fn build_handler(config: &AppConfig, pipeline: SummaryPipeline) -> handler::PagegistServer {
    if config.render_enabled {
        tracing::warn!("render_enabled is set but this build has no render support");
    }
    handler::PagegistServer::new(pipeline)
}
