//! Core types and shared functionality for the prerender service.
//!
//! This crate provides:
//! - Prerender cache store with SQLite backend
//! - Host allow-pattern validation
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod host;

pub use cache::{CacheDb, PrerenderEntry};
pub use config::{AppConfig, BrowserMode, ConfigError, ProbeFailurePolicy};
pub use error::Error;
pub use host::HostValidator;
