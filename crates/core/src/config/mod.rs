//! Application configuration with layered loading.
//!
//! Sources, highest precedence first:
//!
//! 1. Environment variables (`PAGEGIST_*`, nested keys split on `__`,
//!    e.g. `PAGEGIST_SUMMARIZER__MODEL`)
//! 2. TOML config file (if `PAGEGIST_CONFIG_FILE` is set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Default OpenAI-compatible endpoint for the summarizer.
pub const DEFAULT_SUMMARIZER_BASE_URL: &str = "https://api.openai.com/v1";

/// Requested summary length, forwarded to the backend session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    #[default]
    Short,
    Medium,
    Long,
}

/// What the summary should capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryKind {
    #[default]
    KeyPoints,
    Tldr,
}

/// How the backend should lay out its answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryFormat {
    #[default]
    Markdown,
    PlainText,
}

/// Summarization backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_summarizer_base_url")]
    pub base_url: String,

    /// API key. Optional for local servers on a non-default `base_url`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Backend request timeout in milliseconds.
    #[serde(default = "default_summarizer_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub length: SummaryLength,

    /// `key-points` or `tldr` (`PAGEGIST_SUMMARIZER__KIND`).
    #[serde(default)]
    pub kind: SummaryKind,

    /// `markdown` or `plain-text` (`PAGEGIST_SUMMARIZER__FORMAT`).
    #[serde(default)]
    pub format: SummaryFormat,

    /// Stream partial bullets when the backend supports it.
    #[serde(default = "default_true")]
    pub prefer_streaming: bool,

    /// Extra context shared by every summary in the session.
    #[serde(default)]
    pub shared_context: Option<String>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: default_summarizer_base_url(),
            api_key: None,
            model: default_model(),
            timeout_ms: default_summarizer_timeout_ms(),
            length: SummaryLength::default(),
            kind: SummaryKind::default(),
            format: SummaryFormat::default(),
            prefer_streaming: true,
            shared_context: None,
        }
    }
}

impl SummarizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// User-Agent for direct and proxy fetches (`PAGEGIST_USER_AGENT`).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes read per fetch (`PAGEGIST_MAX_BYTES`).
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Per-fetch timeout in milliseconds (`PAGEGIST_TIMEOUT_MS`).
    ///
    /// Applied to the direct fetch and the proxy fetch independently.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether to fall back to the readability proxy (`PAGEGIST_PROXY_ENABLED`).
    #[serde(default = "default_true")]
    pub proxy_enabled: bool,

    /// Proxy endpoint; the target URL is appended (`PAGEGIST_PROXY_ENDPOINT`).
    #[serde(default = "default_proxy_endpoint")]
    pub proxy_endpoint: String,

    /// Whether pages may be opened in a headless browser (`PAGEGIST_RENDER_ENABLED`).
    #[serde(default)]
    pub render_enabled: bool,

    /// Mirror both caches into SQLite (`PAGEGIST_PERSIST_CACHE`).
    #[serde(default)]
    pub persist_cache: bool,

    /// SQLite path used when `persist_cache` is on (`PAGEGIST_DB_PATH`).
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_page_cache_capacity")]
    pub page_cache_capacity: usize,

    #[serde(default = "default_page_cache_ttl_secs")]
    pub page_cache_ttl_secs: u64,

    #[serde(default = "default_summary_cache_capacity")]
    pub summary_cache_capacity: usize,

    #[serde(default = "default_summary_cache_ttl_secs")]
    pub summary_cache_ttl_secs: u64,

    /// Minimum gap between time-triggered streaming updates.
    #[serde(default = "default_stream_throttle_ms")]
    pub stream_throttle_ms: u64,

    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

fn default_user_agent() -> String {
    "pagegist/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    3_000
}

fn default_true() -> bool {
    true
}

fn default_proxy_endpoint() -> String {
    "https://r.jina.ai/".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pagegist-cache.sqlite")
}

fn default_page_cache_capacity() -> usize {
    24
}

fn default_page_cache_ttl_secs() -> u64 {
    6 * 60
}

fn default_summary_cache_capacity() -> usize {
    40
}

fn default_summary_cache_ttl_secs() -> u64 {
    15 * 60
}

fn default_stream_throttle_ms() -> u64 {
    350
}

fn default_summarizer_base_url() -> String {
    DEFAULT_SUMMARIZER_BASE_URL.into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_summarizer_timeout_ms() -> u64 {
    60_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            proxy_enabled: true,
            proxy_endpoint: default_proxy_endpoint(),
            render_enabled: false,
            persist_cache: false,
            db_path: default_db_path(),
            page_cache_capacity: default_page_cache_capacity(),
            page_cache_ttl_secs: default_page_cache_ttl_secs(),
            summary_cache_capacity: default_summary_cache_capacity(),
            summary_cache_ttl_secs: default_summary_cache_ttl_secs(),
            stream_throttle_ms: default_stream_throttle_ms(),
            summarizer: SummarizerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Per-fetch timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn page_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.page_cache_ttl_secs)
    }

    pub fn summary_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.summary_cache_ttl_secs)
    }

    pub fn stream_throttle(&self) -> Duration {
        Duration::from_millis(self.stream_throttle_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the config file or environment cannot be
    /// parsed, or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PAGEGIST_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PAGEGIST_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The summarizer API key, for callers that cannot proceed without one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no key is configured.
    pub fn require_summarizer_api_key(&self) -> Result<&str, ConfigError> {
        self.summarizer.api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "summarizer.api_key".into(),
            hint: "Set PAGEGIST_SUMMARIZER__API_KEY environment variable".into(),
        })
    }
}
