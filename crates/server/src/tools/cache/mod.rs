//! Cache-related MCP tools.
//!
//! This module provides read-only inspection of the current generation.

pub mod get;

pub use get::{CacheGetParams, get_impl};
