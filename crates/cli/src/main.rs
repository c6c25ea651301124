//! Command-line front end for pagegist.
//!
//! Prints partial bullets to stderr while a summary streams in, then the
//! final bullets (or the full record as JSON) to stdout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use pagegist_client::{LiveDocument, ProgressFn, SummaryPipeline};
use pagegist_core::{AppConfig, SummaryProgress, SummaryRecord};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pagegist")]
#[command(about = "Summarize a web page into a few bullet points")]
struct Cli {
    /// URL of the page to summarize
    url: String,

    /// Render the page in headless Chromium instead of fetching it
    #[arg(long)]
    render: bool,

    /// Print the full summary record as JSON
    #[arg(long)]
    json: bool,

    /// Wait for the complete summary instead of streaming partial bullets
    #[arg(long)]
    no_stream: bool,
}

/// Prints each bullet to stderr once the next one has started.
fn stderr_progress() -> ProgressFn {
    let shown = Mutex::new(0usize);
    Arc::new(move |progress: SummaryProgress| {
        if progress.done {
            return;
        }
        let Ok(mut shown) = shown.lock() else {
            return;
        };
        let complete = progress.bullets.len().saturating_sub(1);
        for bullet in progress.bullets.iter().take(complete).skip(*shown) {
            eprintln!("  … {bullet}");
        }
        *shown = (*shown).max(complete);
    })
}

fn print_record(record: &SummaryRecord, cached: bool, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!("{}", record.title);
    for bullet in &record.bullets {
        println!("- {bullet}");
    }
    let cached = if cached { ", cached" } else { "" };
    eprintln!("({}{cached})", record.source);
    Ok(())
}

#[cfg(feature = "render")]
async fn rendered_document(config: &AppConfig, url: &str) -> Result<Option<Arc<dyn LiveDocument>>> {
    let url = pagegist_client::canonicalize(url).map_err(pagegist_core::Error::from)?;
    let browser = pagegist_client::HeadlessBrowser::launch(config.timeout() * 5)
        .await
        .context("failed to launch headless browser")?;
    let doc: Arc<dyn LiveDocument> = Arc::new(browser.open(url));
    Ok(Some(doc))
}

#[cfg(not(feature = "render"))]
async fn rendered_document(_config: &AppConfig, _url: &str) -> Result<Option<Arc<dyn LiveDocument>>> {
    anyhow::bail!("this build has no render support")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load().context("failed to load configuration")?;
    if cli.no_stream {
        config.summarizer.prefer_streaming = false;
    }

    let live = if cli.render || config.render_enabled { rendered_document(&config, &cli.url).await? } else { None };

    let pipeline = SummaryPipeline::from_config(&config).await?;
    let cached = Arc::new(AtomicBool::new(false));
    let on_progress: ProgressFn = {
        let cached = Arc::clone(&cached);
        let partials = stderr_progress();
        Arc::new(move |progress: SummaryProgress| {
            if progress.done {
                cached.store(progress.cached, Ordering::SeqCst);
            }
            partials(progress);
        })
    };

    tracing::debug!(
        url = %cli.url,
        render = live.is_some(),
        streaming = config.summarizer.prefer_streaming,
        "requesting summary"
    );
    let result = pipeline.request_summary(&cli.url, live, Some(on_progress)).await;
    pipeline.shutdown().await;

    let record = result?;
    print_record(&record, cached.load(Ordering::SeqCst), cli.json)
}
