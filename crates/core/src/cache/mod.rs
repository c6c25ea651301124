//! Bounded TTL caches for pages and summaries.
//!
//! [`CacheStore`] is the in-memory store used on the request path. When
//! persistence is enabled the same entries are mirrored into SQLite through
//! [`CacheDb`], which applies its own schema migrations and runs in WAL mode.

pub mod connection;
pub mod entries;
pub mod fingerprint;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use fingerprint::fingerprint;
pub use store::{CacheEntry, CacheStore};
