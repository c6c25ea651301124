//! HTTP fetch pipeline for direct page loads and the readability proxy.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `https`)
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//! - Per-request timeout (default 3s); a timeout is reported as `FETCH_TIMEOUT`
//!
//! ### Content-type gate
//! A response is readable when it has no content type, a `text/*` type, or a
//! type mentioning html, xml or json.

pub mod proxy;
pub mod url;

use pagegist_core::{AppConfig, Error};
use reqwest::{Client, StatusCode, Url, header};
use std::time::{Duration, Instant};

pub use self::proxy::ProxyClient;
pub use self::url::{UrlError, canonicalize, proxy_url};

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.8,text/*;q=0.7";

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "pagegist/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 3s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "pagegist/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(3000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Body decoded as UTF-8 (lossy)
    pub body: String,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Whether the body can be read as text.
    pub fn is_textual(&self) -> bool {
        is_textual(self.content_type.as_deref())
    }
}

/// Whether a `Content-Type` value names something readable as text.
pub fn is_textual(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let media_type = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    media_type.is_empty()
        || media_type.starts_with("text/")
        || media_type.contains("html")
        || media_type.contains("xml")
        || media_type.contains("json")
}

pub(crate) fn map_reqwest_error(err: reqwest::Error, url: &Url) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(url.to_string())
    } else {
        Error::HttpError(format!("network error: {err}"))
    }
}

pub(crate) fn header_value(headers: &header::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// HTTP client for direct page fetches.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Fetch a canonical URL, returning the decoded body and validators.
    ///
    /// Non-2xx statuses and oversized bodies are errors. The content type is
    /// reported but not enforced here; see [`FetchResponse::is_textual`].
    pub async fn fetch(&self, url: &Url) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, ACCEPT)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response.bytes().await.map_err(|e| map_reqwest_error(e, url))?;
        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(%url, %final_url, fetch_ms, bytes = bytes.len(), "fetched page");

        Ok(FetchResponse {
            url: url.clone(),
            final_url,
            status,
            content_type: header_value(&headers, header::CONTENT_TYPE),
            etag: header_value(&headers, header::ETAG),
            last_modified: header_value(&headers, header::LAST_MODIFIED),
            body: String::from_utf8_lossy(&bytes).into_owned(),
            fetch_ms,
        })
    }
}
