//! Content resolution across live, direct and proxy sources.
//!
//! ### Policy
//! 1. A live document with non-empty text wins outright.
//! 2. Otherwise the page is fetched directly and its best candidate region
//!    is scored. A score of [`ACCEPT_SCORE`] or more is accepted as is.
//! 3. Otherwise the readability proxy is also consulted, and the strictly
//!    higher score wins. Ties go to the proxy.
//!
//! Each network attempt has its own timeout. A failing source only removes
//! itself from the contest; resolution fails only when every source failed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pagegist_core::{AppConfig, ContentSource, Error, PageContent};
use url::Url;

use crate::extract::{Extractor, StructuralExtractor, parse_proxy_output, sanitize, score};
use crate::fetch::{FetchClient, FetchConfig, FetchResponse, ProxyClient};
use crate::live::LiveDocument;

/// Direct results scoring at least this much skip the proxy.
pub const ACCEPT_SCORE: u32 = 5;

/// Direct page fetch.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &Url) -> Result<FetchResponse, Error>;
}

/// Readability-proxy fetch returning raw proxy output.
#[async_trait]
pub trait ReadableFetcher: Send + Sync {
    async fn fetch_readable(&self, url: &Url) -> Result<String, Error>;
}

#[async_trait]
impl PageFetcher for FetchClient {
    async fn fetch_page(&self, url: &Url) -> Result<FetchResponse, Error> {
        self.fetch(url).await
    }
}

#[async_trait]
impl ReadableFetcher for ProxyClient {
    async fn fetch_readable(&self, url: &Url) -> Result<String, Error> {
        self.fetch(url).await
    }
}

/// One source's usable output.
#[derive(Debug, Clone)]
struct Attempt {
    text: String,
    title: Option<String>,
    score: u32,
    etag: Option<String>,
    last_modified: Option<String>,
}

fn is_plain_text(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase())
        .is_some_and(|ct| ct.starts_with("text/plain") || ct.contains("json"))
}

fn fallback_title(url: &Url) -> String {
    url.host_str().unwrap_or(url.as_str()).to_string()
}

/// Produces the best available [`PageContent`] for a URL.
pub struct ContentResolver {
    fetcher: Arc<dyn PageFetcher>,
    proxy: Option<Arc<dyn ReadableFetcher>>,
    extractor: Arc<dyn Extractor>,
    timeout: Duration,
}

impl ContentResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, proxy: Option<Arc<dyn ReadableFetcher>>, timeout: Duration) -> Self {
        Self { fetcher, proxy, extractor: Arc::new(StructuralExtractor), timeout }
    }

    /// Build the HTTP-backed resolver described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let fetcher = Arc::new(FetchClient::new(FetchConfig::from(config))?);
        let proxy = ProxyClient::from_config(config)?.map(|p| Arc::new(p) as Arc<dyn ReadableFetcher>);
        Ok(Self::new(fetcher, proxy, config.timeout()))
    }

    /// Resolve `url` to content, preferring `live` when it has text.
    ///
    /// # Errors
    ///
    /// Returns `Error::ContentUnavailable` when no source produced text.
    pub async fn resolve(&self, url: &Url, live: Option<&dyn LiveDocument>) -> Result<PageContent, Error> {
        if let Some(live) = live
            && let Some(content) = self.live_content(url, live).await
        {
            return Ok(content);
        }

        let direct = self.direct(url).await;
        if let Some(d) = &direct
            && d.score >= ACCEPT_SCORE
        {
            tracing::debug!(%url, score = d.score, "accepted direct fetch without proxy");
            return Ok(Self::build_content(url, d.clone(), ContentSource::Network, None));
        }

        let proxied = match &self.proxy {
            Some(proxy) => self.proxied(url, proxy.as_ref()).await,
            None => None,
        };

        match (direct, proxied) {
            (Some(d), Some(p)) if d.score > p.score => {
                tracing::debug!(%url, direct = d.score, proxy = p.score, "direct fetch outscored proxy");
                Ok(Self::build_content(url, d, ContentSource::Network, None))
            }
            (Some(d), Some(p)) => {
                tracing::debug!(%url, direct = d.score, proxy = p.score, "proxy selected");
                Ok(Self::build_content(url, p, ContentSource::Proxy, Some(d)))
            }
            (Some(d), None) => Ok(Self::build_content(url, d, ContentSource::Network, None)),
            (None, Some(p)) => Ok(Self::build_content(url, p, ContentSource::Proxy, None)),
            (None, None) => Err(Error::ContentUnavailable(url.to_string())),
        }
    }

    /// Build the record for the winning attempt. When the proxy wins, the
    /// direct attempt still supplies a missing title and the HTTP validators.
    fn build_content(url: &Url, winner: Attempt, source: ContentSource, direct: Option<Attempt>) -> PageContent {
        let (title, etag, last_modified) = match direct {
            Some(d) => (winner.title.or(d.title), d.etag, d.last_modified),
            None => (winner.title, winner.etag, winner.last_modified),
        };
        let title = title.unwrap_or_else(|| fallback_title(url));
        PageContent::new(url.as_str(), winner.text, title, source)
            .with_validators(etag, last_modified)
            .with_score(winner.score)
    }

    async fn live_content(&self, url: &Url, live: &dyn LiveDocument) -> Option<PageContent> {
        let live = match live.fetch_live_text().await {
            Ok(Some(live)) => live,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(%url, error = %e, "live document unavailable");
                return None;
            }
        };

        let text = sanitize(&live.text);
        if text.is_empty() {
            return None;
        }

        tracing::debug!(%url, chars = text.chars().count(), "using live document text");
        let title = live.title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| fallback_title(url));
        let score = score(&text);
        Some(
            PageContent::new(url.as_str(), text, title, ContentSource::Tab)
                .with_validators(live.etag, live.last_modified)
                .with_score(score),
        )
    }

    async fn direct(&self, url: &Url) -> Option<Attempt> {
        let response = match tokio::time::timeout(self.timeout, self.fetcher.fetch_page(url)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(%url, error = %e, "direct fetch failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(%url, error = %Error::FetchTimeout(url.to_string()), "direct fetch failed");
                return None;
            }
        };

        if !response.is_textual() {
            let err = Error::UnsupportedContentType(response.content_type.clone().unwrap_or_default());
            tracing::warn!(%url, error = %err, "direct fetch skipped");
            return None;
        }

        let (text, title, score) = if is_plain_text(response.content_type.as_deref()) {
            let text = sanitize(&response.body);
            let score = score(&text);
            (text, None, score)
        } else {
            let extraction = self.extractor.extract(&response.body)?;
            (extraction.text, extraction.title, extraction.score)
        };

        if text.is_empty() {
            return None;
        }

        Some(Attempt { text, title, score, etag: response.etag, last_modified: response.last_modified })
    }

    async fn proxied(&self, url: &Url, proxy: &dyn ReadableFetcher) -> Option<Attempt> {
        let raw = match tokio::time::timeout(self.timeout, proxy.fetch_readable(url)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::warn!(%url, error = %e, "proxy fetch failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(%url, error = %Error::FetchTimeout(url.to_string()), "proxy fetch failed");
                return None;
            }
        };

        let doc = parse_proxy_output(&raw);
        tracing::debug!(
            %url,
            source_url = doc.source_url.as_deref().unwrap_or_default(),
            published_time = doc.published_time.as_deref().unwrap_or_default(),
            "parsed proxy preamble"
        );
        if doc.text.is_empty() {
            return None;
        }

        let score = score(&doc.text);
        Some(Attempt { text: doc.text, title: doc.title, score, etag: None, last_modified: None })
    }
}
