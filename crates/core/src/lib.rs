//! Core types and shared functionality for pagegist.
//!
//! This crate provides:
//! - Page content and summary records
//! - In-memory caches with optional SQLite persistence
//! - Single-flight request coalescing
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod types;

pub use cache::{CacheDb, CacheEntry, CacheStore, fingerprint};
pub use coalesce::RequestCoalescer;
pub use config::{AppConfig, ConfigError, SummarizerConfig, SummaryFormat, SummaryKind, SummaryLength};
pub use error::{Error, SummaryError};
pub use types::{ContentSource, DISPLAY_BULLETS, PageContent, SummaryProgress, SummaryRecord};
