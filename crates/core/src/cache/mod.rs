//! SQLite-backed generation store.
//!
//! This module provides the persistent key/value response store the
//! strategies read and write, with async access via tokio-rusqlite. It
//! supports:
//!
//! - Named generations, each owning its entries
//! - Whole-generation deletes that cascade to entries
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CacheEntry, GenerationStore};
