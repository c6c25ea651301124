//! Configuration validation rules, applied after loading.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for out-of-range byte limits, timeouts,
    /// cache sizes or TTLs, an empty user agent, an empty proxy endpoint
    /// while the proxy is enabled, or an empty summarizer model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.proxy_enabled && self.proxy_endpoint.trim().is_empty() {
            return Err(invalid("proxy_endpoint", "must not be empty when the proxy is enabled"));
        }

        for (field, capacity) in
            [("page_cache_capacity", self.page_cache_capacity), ("summary_cache_capacity", self.summary_cache_capacity)]
        {
            if capacity == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }

        for (field, ttl) in
            [("page_cache_ttl_secs", self.page_cache_ttl_secs), ("summary_cache_ttl_secs", self.summary_cache_ttl_secs)]
        {
            if ttl == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }

        if self.summarizer.model.trim().is_empty() {
            return Err(invalid("summarizer.model", "must not be empty"));
        }

        if self.summarizer.timeout_ms < 100 {
            return Err(invalid("summarizer.timeout_ms", "must be at least 100ms"));
        }

        Ok(())
    }
}
