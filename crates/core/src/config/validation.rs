//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 300_000;
const MAX_POOL_SIZE: usize = 32;

fn check_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value < MIN_TIMEOUT_MS {
        return Err(ConfigError::Invalid { field: field.into(), reason: "must be at least 100ms".into() });
    }
    if value > MAX_TIMEOUT_MS {
        return Err(ConfigError::Invalid {
            field: field.into(),
            reason: "must not exceed 5 minutes (300000ms)".into(),
        });
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `allowed_hosts` is not a valid regular expression
    /// - a timeout is below 100ms or above 5 minutes
    /// - `stable_after_ms` is 0 or not shorter than `stability_timeout_ms`
    /// - `stability_poll_ms` is 0
    /// - `browser_pool_size` is 0 or above 32
    /// - `user_agent` or `listen_addr` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.allowed_hosts {
            Some(pattern) => {
                regex::Regex::new(pattern)
                    .map_err(|e| ConfigError::Invalid { field: "allowed_hosts".into(), reason: e.to_string() })?;
            }
            None => {
                tracing::warn!("allowed_hosts is not set; every prerender request will be rejected");
            }
        }

        check_timeout("navigation_timeout_ms", self.navigation_timeout_ms)?;
        check_timeout("stability_timeout_ms", self.stability_timeout_ms)?;
        if let Some(probe_timeout_ms) = self.probe_timeout_ms {
            check_timeout("probe_timeout_ms", probe_timeout_ms)?;
        }

        if self.stable_after_ms == 0 {
            return Err(ConfigError::Invalid { field: "stable_after_ms".into(), reason: "must be greater than 0".into() });
        }
        if self.stable_after_ms >= self.stability_timeout_ms {
            return Err(ConfigError::Invalid {
                field: "stable_after_ms".into(),
                reason: "must be shorter than stability_timeout_ms".into(),
            });
        }
        if self.stability_poll_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "stability_poll_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.browser_pool_size == 0 || self.browser_pool_size > MAX_POOL_SIZE {
            return Err(ConfigError::Invalid {
                field: "browser_pool_size".into(),
                reason: format!("must be between 1 and {MAX_POOL_SIZE}"),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }
        if self.listen_addr.is_empty() {
            return Err(ConfigError::Invalid { field: "listen_addr".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_pattern() {
        let config = AppConfig { allowed_hosts: Some("[a-".into()), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "allowed_hosts"));
    }

    #[test]
    fn test_validate_navigation_timeout_too_small() {
        let config = AppConfig { navigation_timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "navigation_timeout_ms"));
    }

    #[test]
    fn test_validate_probe_timeout_exceeds_limit() {
        let config = AppConfig { probe_timeout_ms: Some(301_000), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "probe_timeout_ms"));
    }

    #[test]
    fn test_validate_quiet_window_longer_than_timeout() {
        let config = AppConfig { stable_after_ms: 10_000, stability_timeout_ms: 10_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "stable_after_ms"));
    }

    #[test]
    fn test_validate_zero_poll() {
        let config = AppConfig { stability_poll_ms: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "stability_poll_ms"));
    }

    #[test]
    fn test_validate_pool_size_bounds() {
        for size in [0, 33] {
            let config = AppConfig { browser_pool_size: size, ..Default::default() };
            let result = config.validate();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "browser_pool_size"));
        }
        let config = AppConfig { browser_pool_size: 32, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }
}
