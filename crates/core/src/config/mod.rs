//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PRERENDER_*)
//! 2. Legacy unprefixed variables (ALLOWED_HOSTS, CHROME_HOST, CHROME_PORT)
//! 3. TOML config file (if PRERENDER_CONFIG_FILE set)
//! 4. Built-in defaults
//!
//! The resulting [`AppConfig`] is built once at startup and handed to each
//! component by reference; nothing reads the environment after that.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Environment variables honoured without the `PRERENDER_` prefix.
const LEGACY_ENV_KEYS: &[&str] = &["ALLOWED_HOSTS", "CHROME_HOST", "CHROME_PORT"];

/// How the renderer obtains a browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserMode {
    /// Spawn a local Chrome/Chromium per session with a scoped temporary profile.
    #[default]
    Launch,
    /// Attach to an already running browser at `chrome_host:chrome_port`.
    Connect,
}

/// What to do with a cached entry when the origin cannot tell us whether it changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailurePolicy {
    /// Serve the cached HTML as if it were fresh.
    #[default]
    ServeCached,
    /// Treat the entry as stale and render again.
    Rerender,
    /// Fail the request.
    Fail,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PRERENDER_*)
/// 2. Legacy variables (ALLOWED_HOSTS, CHROME_HOST, CHROME_PORT)
/// 3. TOML config file (if PRERENDER_CONFIG_FILE set)
/// 4. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Regular expression that request hosts must match.
    ///
    /// Set via PRERENDER_ALLOWED_HOSTS or ALLOWED_HOSTS.
    /// When absent every request is rejected.
    #[serde(default)]
    pub allowed_hosts: Option<String>,

    /// Socket address the HTTP listener binds to.
    ///
    /// Set via PRERENDER_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path to SQLite cache database.
    ///
    /// Set via PRERENDER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Host of the browser DevTools endpoint (connect mode).
    ///
    /// Set via PRERENDER_CHROME_HOST or CHROME_HOST.
    #[serde(default = "default_chrome_host")]
    pub chrome_host: String,

    /// Port of the browser DevTools endpoint (connect mode).
    ///
    /// Set via PRERENDER_CHROME_PORT or CHROME_PORT.
    #[serde(default = "default_chrome_port")]
    pub chrome_port: u16,

    /// Launch a local browser per session or connect to a running one.
    #[serde(default)]
    pub browser_mode: BrowserMode,

    /// Explicit browser binary for launch mode; auto-detected when unset.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    /// Run launched browsers without a window.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Upper bound on page navigation, in milliseconds.
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Quiet period without DOM mutations before a page counts as settled.
    #[serde(default = "default_stable_after_ms")]
    pub stable_after_ms: u64,

    /// Upper bound on waiting for the page to settle, in milliseconds.
    #[serde(default = "default_stability_timeout_ms")]
    pub stability_timeout_ms: u64,

    /// How often the DOM quiet period is sampled, in milliseconds.
    #[serde(default = "default_stability_poll_ms")]
    pub stability_poll_ms: u64,

    /// Timeout for the origin `HEAD` probe. Transport default when unset.
    #[serde(default)]
    pub probe_timeout_ms: Option<u64>,

    /// User-Agent string for origin probes.
    ///
    /// Set via PRERENDER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Behaviour when the origin probe fails or reports no Last-Modified.
    #[serde(default)]
    pub probe_failure: ProbeFailurePolicy,

    /// Maximum number of concurrently checked-out browser sessions.
    #[serde(default = "default_browser_pool_size")]
    pub browser_pool_size: usize,

    /// Keep healthy sessions open between renders.
    #[serde(default = "default_true")]
    pub keep_warm: bool,
}

fn default_listen_addr() -> String {
    "0.0.0.0:9333".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./prerender.db")
}

fn default_chrome_host() -> String {
    "localhost".into()
}

fn default_chrome_port() -> u16 {
    9222
}

fn default_navigation_timeout_ms() -> u64 {
    10_000
}

fn default_stable_after_ms() -> u64 {
    450
}

fn default_stability_timeout_ms() -> u64 {
    10_000
}

fn default_stability_poll_ms() -> u64 {
    25
}

fn default_user_agent() -> String {
    "prerender/0.1".into()
}

fn default_browser_pool_size() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: None,
            listen_addr: default_listen_addr(),
            db_path: default_db_path(),
            chrome_host: default_chrome_host(),
            chrome_port: default_chrome_port(),
            browser_mode: BrowserMode::default(),
            chrome_executable: None,
            headless: true,
            navigation_timeout_ms: default_navigation_timeout_ms(),
            stable_after_ms: default_stable_after_ms(),
            stability_timeout_ms: default_stability_timeout_ms(),
            stability_poll_ms: default_stability_poll_ms(),
            probe_timeout_ms: None,
            user_agent: default_user_agent(),
            probe_failure: ProbeFailurePolicy::default(),
            browser_pool_size: default_browser_pool_size(),
            keep_warm: true,
        }
    }
}

impl AppConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn stable_after(&self) -> Duration {
        Duration::from_millis(self.stable_after_ms)
    }

    pub fn stability_timeout(&self) -> Duration {
        Duration::from_millis(self.stability_timeout_ms)
    }

    pub fn stability_poll(&self) -> Duration {
        Duration::from_millis(self.stability_poll_ms)
    }

    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout_ms.map(Duration::from_millis)
    }

    /// DevTools HTTP endpoint used in connect mode.
    pub fn devtools_endpoint(&self) -> String {
        format!("http://{}:{}", self.chrome_host, self.chrome_port)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PRERENDER_`
    /// 2. Legacy `ALLOWED_HOSTS`, `CHROME_HOST`, `CHROME_PORT`
    /// 3. TOML file from `PRERENDER_CONFIG_FILE` (if set)
    /// 4. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PRERENDER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment
            .merge(
                Env::raw()
                    .only(LEGACY_ENV_KEYS)
                    .map(|key| key.as_str().to_lowercase().into()),
            )
            .merge(
                Env::prefixed("PRERENDER_")
                    .ignore(&["CONFIG_FILE"])
                    .map(|key| key.as_str().to_lowercase().into())
                    .split("__"),
            );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
