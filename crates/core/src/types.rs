//! Records that flow through the summary pipeline.

use serde::{Deserialize, Serialize};

use crate::cache::fingerprint;

/// Bullets surfaced to callers, after the parser's own cap.
pub const DISPLAY_BULLETS: usize = 3;

/// Where a [`PageContent`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    /// Text read from a live, already-open document.
    Tab,
    /// Direct HTTP fetch plus structural extraction.
    Network,
    /// Readability proxy rendering.
    Proxy,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::Tab => "tab",
            ContentSource::Network => "network",
            ContentSource::Proxy => "proxy",
        }
    }
}

impl std::fmt::Display for ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved textual payload for a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PageContent {
    /// Canonical URL the content was resolved for.
    pub url: String,
    /// Sanitized, length-capped text.
    pub text: String,
    /// `<hash>:<length>` content identity.
    pub fingerprint: String,
    pub title: String,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub source: ContentSource,
    /// Quality score of the winning candidate, when one was computed.
    pub score: Option<u32>,
}

impl PageContent {
    /// Build a record, computing the fingerprint from `text`.
    pub fn new(url: impl Into<String>, text: String, title: impl Into<String>, source: ContentSource) -> Self {
        let fingerprint = fingerprint(&text);
        Self {
            url: url.into(),
            text,
            fingerprint,
            title: title.into(),
            last_modified: None,
            etag: None,
            source,
            score: None,
        }
    }

    pub fn with_validators(mut self, etag: Option<String>, last_modified: Option<String>) -> Self {
        self.etag = etag;
        self.last_modified = last_modified;
        self
    }

    pub fn with_score(mut self, score: u32) -> Self {
        self.score = Some(score);
        self
    }
}

/// A produced summary plus the content identity it was produced from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SummaryRecord {
    pub url: String,
    pub title: String,
    pub bullets: Vec<String>,
    /// Full backend response text.
    pub raw: String,
    pub fingerprint: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub source: ContentSource,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl SummaryRecord {
    /// Build a record for `content`, copying its identity fields.
    pub fn from_content(content: &PageContent, bullets: Vec<String>, raw: String) -> Self {
        Self {
            url: content.url.clone(),
            title: content.title.clone(),
            bullets: bullets.into_iter().take(DISPLAY_BULLETS).collect(),
            raw,
            fingerprint: content.fingerprint.clone(),
            etag: content.etag.clone(),
            last_modified: content.last_modified.clone(),
            source: content.source,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Whether this summary still describes `content`.
    ///
    /// The fingerprint must match. Validators are only compared when the
    /// current content carries them; their absence never invalidates.
    /// Age is the cache's concern.
    pub fn matches(&self, content: &PageContent) -> bool {
        if self.fingerprint != content.fingerprint {
            return false;
        }
        if let Some(etag) = &content.etag
            && self.etag.as_ref() != Some(etag)
        {
            return false;
        }
        if let Some(last_modified) = &content.last_modified
            && self.last_modified.as_ref() != Some(last_modified)
        {
            return false;
        }
        true
    }
}

/// Progress snapshot delivered to pipeline listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SummaryProgress {
    pub bullets: Vec<String>,
    pub raw: String,
    pub cached: bool,
    pub source: ContentSource,
    pub done: bool,
}

impl SummaryProgress {
    pub fn partial(bullets: &[String], raw: &str, source: ContentSource) -> Self {
        Self {
            bullets: bullets.iter().take(DISPLAY_BULLETS).cloned().collect(),
            raw: raw.to_string(),
            cached: false,
            source,
            done: false,
        }
    }

    pub fn finished(record: &SummaryRecord, cached: bool) -> Self {
        Self { bullets: record.bullets.clone(), raw: record.raw.clone(), cached, source: record.source, done: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(text: &str) -> PageContent {
        PageContent::new("https://example.com/a", text.to_string(), "A", ContentSource::Network)
    }

    #[test]
    fn test_summary_matches_its_content() {
        let page = content("some article text").with_validators(Some("\"v1\"".into()), Some("Mon".into()));
        let summary = SummaryRecord::from_content(&page, vec!["one".into()], "- one".into());
        assert!(summary.matches(&page));
    }

    #[test]
    fn test_fingerprint_change_invalidates() {
        let page = content("some article text");
        let summary = SummaryRecord::from_content(&page, vec!["one".into()], "- one".into());

        let mut changed = page.clone();
        changed.fingerprint = "456:500".into();
        assert!(!summary.matches(&changed));
    }

    #[test]
    fn test_validators_checked_only_when_present() {
        let page = content("same text").with_validators(Some("\"v1\"".into()), None);
        let summary = SummaryRecord::from_content(&page, vec![], String::new());

        let without_validators = content("same text");
        assert!(summary.matches(&without_validators));

        let new_etag = content("same text").with_validators(Some("\"v2\"".into()), None);
        assert!(!summary.matches(&new_etag));

        let new_last_modified = content("same text").with_validators(None, Some("Tue".into()));
        assert!(!summary.matches(&new_last_modified));
    }

    #[test]
    fn test_record_caps_bullets() {
        let page = content("text");
        let bullets = (0..7).map(|i| format!("bullet {i}")).collect();
        let summary = SummaryRecord::from_content(&page, bullets, String::new());
        assert_eq!(summary.bullets.len(), DISPLAY_BULLETS);
    }

    #[test]
    fn test_source_serialization() {
        assert_eq!(serde_json::to_string(&ContentSource::Proxy).unwrap(), "\"proxy\"");
        assert_eq!(ContentSource::Tab.to_string(), "tab");
    }
}
