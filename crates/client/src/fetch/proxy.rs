//! Readability proxy client.
//!
//! The proxy renders a page server-side and returns its main text, usually as
//! markdown preceded by a short metadata preamble. Output is returned raw; the
//! resolver is responsible for lifting the title and cleaning the body.

use pagegist_core::{AppConfig, Error};
use reqwest::{Client, Url, header};
use std::time::{Duration, Instant};

use super::{map_reqwest_error, proxy_url};

/// HTTP client for the readability proxy.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: Client,
    endpoint: String,
    max_bytes: usize,
}

impl ProxyClient {
    pub fn new(
        endpoint: impl Into<String>, user_agent: &str, timeout: Duration, max_bytes: usize,
    ) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build proxy client: {e}")))?;

        Ok(Self { http, endpoint: endpoint.into(), max_bytes })
    }

    /// Build a proxy client from application config, or `None` when the proxy is disabled.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, Error> {
        if !config.proxy_enabled {
            return Ok(None);
        }
        Self::new(&config.proxy_endpoint, &config.user_agent, config.timeout(), config.max_bytes).map(Some)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the proxy rendering of `target` as raw text.
    pub async fn fetch(&self, target: &Url) -> Result<String, Error> {
        let start = Instant::now();
        let address = proxy_url(&self.endpoint, target);

        let response = self
            .http
            .get(&address)
            .header(header::ACCEPT, "text/plain, text/markdown;q=0.9, */*;q=0.5")
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, target))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("proxy status {}", status.as_u16())));
        }

        let bytes = response.bytes().await.map_err(|e| map_reqwest_error(e, target))?;
        if bytes.len() > self.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.max_bytes)));
        }

        tracing::debug!(%target, fetch_ms = start.elapsed().as_millis() as u64, bytes = bytes.len(), "fetched proxy rendering");

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn proxy(server: &MockServer, timeout: Duration) -> ProxyClient {
        ProxyClient::new(format!("{}/", server.uri()), "pagegist/0.1", timeout, 1024 * 1024).unwrap()
    }

    #[test]
    fn test_from_config_disabled() {
        let config = AppConfig { proxy_enabled: false, ..Default::default() };
        assert!(ProxyClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_from_config_enabled() {
        let proxy = ProxyClient::from_config(&AppConfig::default()).unwrap().unwrap();
        assert_eq!(proxy.endpoint(), "https://r.jina.ai/");
    }

    #[tokio::test]
    async fn test_fetch_requests_templated_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/https://example.com/post"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Title: Post\n\nMarkdown Content:\nBody"))
            .expect(1)
            .mount(&server)
            .await;

        let target = Url::parse("https://example.com/post").unwrap();
        let body = proxy(&server, Duration::from_secs(2)).fetch(&target).await.unwrap();
        assert!(body.starts_with("Title: Post"));
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let target = Url::parse("https://example.com/").unwrap();
        let err = proxy(&server, Duration::from_secs(2)).fetch(&target).await.unwrap_err();
        assert!(matches!(err, Error::HttpError(msg) if msg.contains("502")));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let target = Url::parse("https://example.com/").unwrap();
        let err = proxy(&server, Duration::from_millis(100)).fetch(&target).await.unwrap_err();
        assert!(matches!(err, Error::FetchTimeout(_)));
    }
}
