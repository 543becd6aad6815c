//! Allow-pattern gate for request hosts.
//!
//! The pattern is compiled once at startup. Matching is an unanchored search,
//! so operators who want an exact host must write `^example\.com$`.

use regex::Regex;

use crate::Error;
use crate::config::{AppConfig, ConfigError};

/// Decides whether a requested origin host may be prerendered.
#[derive(Debug, Clone)]
pub struct HostValidator {
    pattern: Option<Regex>,
}

impl HostValidator {
    /// Compile the validator from an optional allow-pattern.
    ///
    /// A `None` pattern yields a validator that rejects every host.
    pub fn new(pattern: Option<&str>) -> Result<Self, ConfigError> {
        let pattern = pattern
            .map(Regex::new)
            .transpose()
            .map_err(|e| ConfigError::Invalid { field: "allowed_hosts".into(), reason: e.to_string() })?;
        Ok(Self { pattern })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Self::new(config.allowed_hosts.as_deref())
    }

    /// Check `host` against the allow-pattern.
    pub fn check(&self, host: &str) -> Result<(), Error> {
        let Some(pattern) = &self.pattern else {
            tracing::warn!(host, "no allow-pattern configured; rejecting host");
            return Err(Error::HostNotAllowed(format!("{host} (no allow-pattern configured)")));
        };

        if pattern.is_match(host) {
            tracing::info!(host, pattern = pattern.as_str(), "host allowed");
            Ok(())
        } else {
            tracing::warn!(host, pattern = pattern.as_str(), "host did not match allow-pattern");
            Err(Error::HostNotAllowed(host.to_string()))
        }
    }
}
