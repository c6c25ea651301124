//! Live-document accessors.
//!
//! A live document is a page that is already open under the caller's
//! control. When one is supplied, its text is trusted as the freshest and
//! cheapest source and no network fetch is made.
//!
//! - [`StaticDocument`] wraps text the caller already holds.
//! - [`HeadlessDocument`] (feature `render`) opens the page in headless
//!   Chromium and reads the rendered text.

use async_trait::async_trait;
use pagegist_core::Error;

/// What a live document reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveText {
    pub text: String,
    pub title: Option<String>,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

/// Accessor for a page that is open locally.
#[async_trait]
pub trait LiveDocument: Send + Sync {
    /// Current text of the document, or `None` when it is no longer
    /// accessible or does not support extraction.
    async fn fetch_live_text(&self) -> Result<Option<LiveText>, Error>;
}

/// Text supplied up front by the caller.
#[derive(Debug, Clone, Default)]
pub struct StaticDocument {
    live: LiveText,
}

impl StaticDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { live: LiveText { text: text.into(), ..Default::default() } }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.live.title = Some(title.into());
        self
    }

    pub fn with_validators(mut self, etag: Option<String>, last_modified: Option<String>) -> Self {
        self.live.etag = etag;
        self.live.last_modified = last_modified;
        self
    }
}

#[async_trait]
impl LiveDocument for StaticDocument {
    async fn fetch_live_text(&self) -> Result<Option<LiveText>, Error> {
        if self.live.text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(self.live.clone()))
    }
}

#[cfg(feature = "render")]
pub use headless::{HeadlessBrowser, HeadlessDocument};

#[cfg(feature = "render")]
mod headless {
    use super::{LiveDocument, LiveText};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use futures_util::StreamExt;
    use pagegist_core::Error;
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    const BODY_TEXT: &str = "document.body ? document.body.innerText : ''";
    const LAST_MODIFIED: &str = "document.lastModified || ''";

    /// A headless Chromium instance shared by every document it opens.
    #[derive(Clone)]
    pub struct HeadlessBrowser {
        browser: Arc<Browser>,
        timeout: Duration,
    }

    impl HeadlessBrowser {
        /// Launch a headless browser.
        ///
        /// The CDP event handler runs on a background task for the life of
        /// the browser.
        pub async fn launch(timeout: Duration) -> Result<Self, Error> {
            let config = BrowserConfig::builder()
                .build()
                .map_err(|e| Error::LiveDocument(format!("browser config: {e}")))?;
            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| Error::LiveDocument(format!("browser launch failed: {e}")))?;

            tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        tracing::debug!("browser handler event error: {e}");
                        break;
                    }
                }
            });

            Ok(Self { browser: Arc::new(browser), timeout })
        }

        /// A live document for `url`; the page is loaded when text is requested.
        pub fn open(&self, url: Url) -> HeadlessDocument {
            HeadlessDocument { browser: self.clone(), url }
        }
    }

    /// A page rendered on demand in a [`HeadlessBrowser`].
    pub struct HeadlessDocument {
        browser: HeadlessBrowser,
        url: Url,
    }

    impl HeadlessDocument {
        async fn read(&self) -> Result<LiveText, Error> {
            let page = self
                .browser
                .browser
                .new_page(self.url.as_str())
                .await
                .map_err(|e| Error::LiveDocument(format!("navigation failed: {e}")))?;

            let result: Result<LiveText, Error> = async {
                page.wait_for_navigation()
                    .await
                    .map_err(|e| Error::LiveDocument(format!("navigation failed: {e}")))?;

                let text: String = page
                    .evaluate(BODY_TEXT)
                    .await
                    .map_err(|e| Error::LiveDocument(e.to_string()))?
                    .into_value()
                    .map_err(|e| Error::LiveDocument(e.to_string()))?;

                let title = page
                    .get_title()
                    .await
                    .map_err(|e| Error::LiveDocument(e.to_string()))?;

                let last_modified: String = page
                    .evaluate(LAST_MODIFIED)
                    .await
                    .map_err(|e| Error::LiveDocument(e.to_string()))?
                    .into_value()
                    .map_err(|e| Error::LiveDocument(e.to_string()))?;

                Ok(LiveText {
                    text,
                    title: title.filter(|t| !t.trim().is_empty()),
                    last_modified: Some(last_modified).filter(|v| !v.is_empty()),
                    etag: None,
                })
            }
            .await;

            if let Err(e) = page.close().await {
                tracing::debug!(url = %self.url, "failed to close page: {e}");
            }
            result
        }
    }

    #[async_trait]
    impl LiveDocument for HeadlessDocument {
        async fn fetch_live_text(&self) -> Result<Option<LiveText>, Error> {
            let live = tokio::time::timeout(self.browser.timeout, self.read())
                .await
                .map_err(|_| Error::LiveDocument(format!("render timeout after {:?}", self.browser.timeout)))??;
            Ok(Some(live).filter(|l| !l.text.trim().is_empty()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        #[ignore = "requires Chrome/Chromium installation"]
        async fn test_headless_browser_launch() {
            assert!(HeadlessBrowser::launch(Duration::from_secs(30)).await.is_ok());
        }

        #[tokio::test]
        #[ignore = "requires network and Chrome/Chromium"]
        async fn test_headless_document_reads_text() {
            let browser = HeadlessBrowser::launch(Duration::from_secs(30)).await.unwrap();
            let doc = browser.open(Url::parse("https://example.com").unwrap());
            let live = doc.fetch_live_text().await.unwrap().unwrap();
            assert!(live.text.contains("Example Domain"));
            assert_eq!(live.title.as_deref(), Some("Example Domain"));
        }
    }
}
