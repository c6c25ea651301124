//! MCP tool implementations.
//!
//! This module contains all tools exposed by the pagegist server.

pub mod cache;
pub mod summarize_page;

pub use summarize_page::{SummarizePageOutput, SummarizePageParams};
