//! URL canonicalization for cache keys and proxy targets.

use std::sync::LazyLock;

use pagegist_core::Error;
use regex::Regex;
use url::Url;

static RE_SCHEME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").unwrap());

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for Error {
    fn from(err: UrlError) -> Self {
        match err {
            UrlError::Empty => Error::InvalidInput("url is required".into()),
            other => Error::InvalidUrl(other.to_string()),
        }
    }
}

/// Canonicalize a URL string.
///
/// The canonical string is the key for both caches and the coalescer, so two
/// spellings of one resource must map to the same value:
///
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Only http and https are accepted
/// 4. Lowercase the host
/// 5. Remove fragment (#...)
/// 6. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let with_scheme = if RE_SCHEME.is_match(trimmed) { trimmed.to_string() } else { format!("https://{trimmed}") };
    let mut parsed = Url::parse(&with_scheme).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    let host = parsed
        .host_str()
        .map(str::to_lowercase)
        .ok_or_else(|| UrlError::InvalidUrl(format!("missing host in {trimmed}")))?;
    parsed
        .set_host(Some(&host))
        .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Build the readability-proxy address for `target`.
///
/// The target is appended to the endpoint as `scheme://host[:port]/path[?query]`.
pub fn proxy_url(endpoint: &str, target: &Url) -> String {
    let mut out = String::with_capacity(endpoint.len() + target.as_str().len() + 1);
    out.push_str(endpoint);
    if !endpoint.ends_with('/') {
        out.push('/');
    }
    out.push_str(target.scheme());
    out.push_str("://");
    out.push_str(target.host_str().unwrap_or_default());
    if let Some(port) = target.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(target.path());
    if let Some(query) = target.query() {
        out.push('?');
        out.push_str(query);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("example.com/post").unwrap();
        assert_eq!(url.as_str(), "https://example.com/post");
    }

    #[test]
    fn test_canonicalize_lowercases_host_and_drops_fragment() {
        let url = canonicalize("  https://EXAMPLE.com/Path?b=2&a=1#top ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/Path?b=2&a=1");
    }

    #[test]
    fn test_canonicalize_same_resource_same_key() {
        let a = canonicalize("https://Example.com/a#one").unwrap();
        let b = canonicalize("example.com/a#two").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_canonicalize_url_in_query_without_scheme() {
        let url = canonicalize("example.com/login?next=https://example.com/x").unwrap();
        assert_eq!(url.as_str(), "https://example.com/login?next=https://example.com/x");
    }

    #[test]
    fn test_canonicalize_empty() {
        assert_eq!(canonicalize(""), Err(UrlError::Empty));
        assert_eq!(canonicalize("   "), Err(UrlError::Empty));
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        assert!(matches!(canonicalize("ftp://example.com/file"), Err(UrlError::UnsupportedScheme(_))));
        assert!(matches!(canonicalize("file:///etc/hosts"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_http_allowed() {
        let url = canonicalize("http://example.com").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_url_error_maps_to_input_errors() {
        assert!(matches!(Error::from(UrlError::Empty), Error::InvalidInput(_)));
        assert!(matches!(Error::from(UrlError::UnsupportedScheme("ftp".into())), Error::InvalidUrl(_)));
    }

    #[test]
    fn test_proxy_url_template() {
        let target = canonicalize("https://example.com/news/story?id=7").unwrap();
        assert_eq!(
            proxy_url("https://r.jina.ai/", &target),
            "https://r.jina.ai/https://example.com/news/story?id=7"
        );
    }

    #[test]
    fn test_proxy_url_keeps_port_and_adds_separator() {
        let target = canonicalize("http://localhost:8080/").unwrap();
        assert_eq!(proxy_url("http://proxy.local", &target), "http://proxy.local/http://localhost:8080/");
    }
}
