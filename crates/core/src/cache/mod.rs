//! SQLite-backed cache of rendered pages.
//!
//! This module provides a persistent cache keyed by canonical URL using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Automatic schema migrations
//! - WAL mode for concurrent access from several request handles
//! - Deterministic lookup when duplicate rows exist (newest id wins)
//! - Transactional replacement of stale entries

pub mod connection;
pub mod entries;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::PrerenderEntry;
