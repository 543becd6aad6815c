//! Headless browser rendering for client-rendered pages.
//!
//! This module provides a renderer trait, a bounded pool of browser
//! sessions, and a feature-gated implementation using chromiumoxide for
//! headless Chrome/Chromium control.

pub mod pool;
pub mod stability;

#[cfg(feature = "render")]
pub mod chrome;

use std::time::Duration;
use thiserror::Error;
use url::Url;

use prerender_core::{AppConfig, Error};

pub use pool::{Pool, PoolStatus, SessionLease, SessionManager};
pub use stability::wait_until_stable;

#[cfg(feature = "render")]
pub use chrome::{ChromeManager, ChromeSession, HeadlessRenderer};

/// Flags passed to every launched browser to keep first-run UI out of renders.
pub const STARTUP_FLAGS: &[&str] = &["--disable-new-tab-first-run", "--no-first-run", "--disable-translate"];

/// Errors that can occur during page rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Failed to launch or connect to browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Could not create the scoped browser profile directory.
    #[error("browser profile setup failed: {0}")]
    Profile(#[from] std::io::Error),

    /// Failed to open or activate a tab.
    #[error("tab setup failed: {0}")]
    Tab(String),

    /// Failed to navigate to URL.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Navigation did not finish in time.
    #[error("navigation timeout after {0}ms")]
    NavigationTimeout(u64),

    /// The DOM kept changing past the stability timeout.
    #[error("page did not stabilize within {0}ms")]
    StabilityTimeout(u64),

    /// Failed to evaluate a script in the page.
    #[error("script evaluation failed: {0}")]
    Script(String),

    /// Failed to get page content.
    #[error("content retrieval failed: {0}")]
    ContentRetrieval(String),

    /// Browser closed unexpectedly.
    #[error("browser closed unexpectedly")]
    BrowserClosed,

    /// Rendering is compiled out of this build.
    #[error("rendering is disabled")]
    Disabled,
}

impl From<RenderError> for Error {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Navigation(msg) => Error::NavigationFailed(msg),
            RenderError::NavigationTimeout(ms) => Error::NavigationTimeout(ms),
            RenderError::StabilityTimeout(ms) => Error::StabilityTimeout(ms),
            RenderError::Disabled => Error::RenderDisabled,
            other => Error::RenderFailed(other.to_string()),
        }
    }
}

/// Timing knobs for a single render.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Upper bound on navigation (default: 10s).
    pub navigation_timeout: Duration,

    /// Quiet period with no DOM mutation before the page counts as settled (default: 450ms).
    pub stable_after: Duration,

    /// Upper bound on waiting for the page to settle (default: 10s).
    pub stability_timeout: Duration,

    /// Sampling interval while waiting for stability (default: 25ms).
    pub poll_interval: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(10),
            stable_after: Duration::from_millis(450),
            stability_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(25),
        }
    }
}

impl From<&AppConfig> for RenderOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            navigation_timeout: config.navigation_timeout(),
            stable_after: config.stable_after(),
            stability_timeout: config.stability_timeout(),
            poll_interval: config.stability_poll(),
        }
    }
}

/// Result of rendering a page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Serialized document.
    pub html: String,

    /// Time taken to render in milliseconds.
    pub render_time_ms: u64,
}

/// Renderer trait for headless browser page rendering.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// Render a URL to HTML via headless browser.
    async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError>;
}

/// Renderer used when the `render` feature is compiled out.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRenderer;

#[async_trait::async_trait]
impl Renderer for DisabledRenderer {
    async fn render(&self, _url: &Url, _opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
        Err(RenderError::Disabled)
    }
}
