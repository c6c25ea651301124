//! Readability-proxy output parsing.
//!
//! Proxy responses usually look like:
//!
//! ```text
//! Title: Some headline
//! URL Source: https://example.com/story
//! Published Time: 2024-10-01T10:00:00Z
//! Markdown Content:
//! ...body...
//! ```
//!
//! The preamble is optional and any of its lines may be missing. Other
//! `Key: value` lines (such as `Warning:`) may appear between them.

use std::sync::LazyLock;

use regex::Regex;

use super::sanitize::{html_to_text, sanitize};

static RE_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z0-9 -]{0,40}:(\s|$)").unwrap());

const TITLE: &str = "Title:";
const URL_SOURCE: &str = "URL Source:";
const PUBLISHED_TIME: &str = "Published Time:";
const MARKDOWN_CONTENT: &str = "Markdown Content:";

/// Proxy output with its preamble lifted out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyDocument {
    pub title: Option<String>,
    pub source_url: Option<String>,
    pub published_time: Option<String>,
    /// Sanitized body text.
    pub text: String,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    let prefix: String = head.chars().take(512).collect::<String>().to_ascii_lowercase();
    prefix.starts_with("<!doctype html") || prefix.starts_with("<html") || (prefix.starts_with('<') && prefix.contains("</"))
}

/// Split proxy output into preamble fields and a sanitized body.
pub fn parse_proxy_output(raw: &str) -> ProxyDocument {
    let mut doc = ProxyDocument::default();
    let mut rest = raw;
    let mut in_preamble = false;

    loop {
        let (line, remainder) = match rest.split_once('\n') {
            Some((line, remainder)) => (line, remainder),
            None => (rest, ""),
        };
        let trimmed = line.trim();

        if let Some(value) = trimmed.strip_prefix(TITLE) {
            doc.title = non_empty(value);
            in_preamble = true;
        } else if let Some(value) = trimmed.strip_prefix(URL_SOURCE) {
            doc.source_url = non_empty(value);
            in_preamble = true;
        } else if let Some(value) = trimmed.strip_prefix(PUBLISHED_TIME) {
            doc.published_time = non_empty(value);
            in_preamble = true;
        } else if let Some(value) = trimmed.strip_prefix(MARKDOWN_CONTENT) {
            rest = if value.trim().is_empty() { remainder } else { rest.trim_start().trim_start_matches(MARKDOWN_CONTENT) };
            break;
        } else {
            let unknown_field = in_preamble && RE_HEADER.is_match(trimmed);
            if (!trimmed.is_empty() && !unknown_field) || remainder.is_empty() {
                break;
            }
        }

        rest = remainder;
        if rest.is_empty() {
            break;
        }
    }

    doc.text = if looks_like_html(rest) { html_to_text(rest) } else { sanitize(rest) };
    doc
}
