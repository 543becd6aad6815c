//! Chrome/Chromium sessions driven over the DevTools protocol.
//!
//! In launch mode every session owns its browser process and a scoped
//! temporary profile directory. In connect mode sessions share the remote
//! browser at `chrome_host:chrome_port` and only own their tabs.
//!
//! Every render runs in its own browser context, so cookies, storage, cache
//! and service workers never carry over from one render to the next, even
//! when the process is reused.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use futures_util::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use url::Url;

use prerender_core::{AppConfig, BrowserMode};

use super::{
    Pool, RenderError, RenderOptions, RenderedPage, Renderer, STARTUP_FLAGS, SessionManager, wait_until_stable,
};

/// Milliseconds since the last DOM mutation. The first call in a document
/// installs the observer and reports zero.
const QUIET_FOR_MS: &str = r#"(() => {
    if (window.__prerenderLastMutation === undefined) {
        window.__prerenderLastMutation = performance.now();
        new MutationObserver(() => { window.__prerenderLastMutation = performance.now(); })
            .observe(document, { subtree: true, childList: true, attributes: true, characterData: true });
        return 0;
    }
    return performance.now() - window.__prerenderLastMutation;
})()"#;

const BROWSER_EXIT_GRACE: Duration = Duration::from_secs(5);

/// One browser connection plus the resources it keeps alive.
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    mode: BrowserMode,
    // Dropped after `browser`, so the process is gone before the directory is removed.
    _profile: Option<TempDir>,
}

impl ChromeSession {
    /// Render `url` in a fresh foreground tab inside a throwaway browser context.
    pub async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<String, RenderError> {
        let context = self
            .browser
            .execute(CreateBrowserContextParams { dispose_on_detach: Some(true), ..Default::default() })
            .await
            .map_err(|e| RenderError::Tab(format!("browser context: {e}")))?
            .result
            .browser_context_id;

        let result = self.render_in(&context, url, opts).await;

        if let Err(e) = self.browser.execute(DisposeBrowserContextParams::new(context)).await {
            tracing::debug!(url = %url, "failed to dispose browser context: {e}");
        }
        result
    }

    async fn render_in(
        &self, context: &BrowserContextId, url: &Url, opts: &RenderOptions,
    ) -> Result<String, RenderError> {
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context.clone())
            .build()
            .map_err(RenderError::Tab)?;
        let page = self
            .browser
            .new_page(target)
            .await
            .map_err(|e| RenderError::Tab(e.to_string()))?;

        let result = drive_page(&page, url, opts).await;

        if let Err(e) = page.close().await {
            tracing::debug!(url = %url, "failed to close tab: {e}");
        }
        result
    }

    fn is_alive(&self) -> bool {
        !self.handler.is_finished()
    }

    /// Stop the browser (launch mode) and release the profile directory.
    ///
    /// Connect-mode sessions only drop their connection; the remote
    /// browser keeps running.
    pub async fn shutdown(mut self) {
        if self.mode == BrowserMode::Launch {
            if let Err(e) = self.browser.close().await {
                tracing::debug!("browser close failed: {e}");
            }
            match tokio::time::timeout(BROWSER_EXIT_GRACE, self.browser.wait()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::debug!("waiting for browser exit failed: {e}"),
                Err(_) => {
                    tracing::warn!("browser did not exit within grace period; killing");
                    if let Some(Err(e)) = self.browser.kill().await {
                        tracing::debug!("browser kill failed: {e}");
                    }
                }
            }
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

async fn drive_page(page: &Page, url: &Url, opts: &RenderOptions) -> Result<String, RenderError> {
    // Background tabs may have rendering and timers throttled.
    page.bring_to_front()
        .await
        .map_err(|e| RenderError::Tab(e.to_string()))?;

    match tokio::time::timeout(opts.navigation_timeout, page.goto(url.as_str())).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(RenderError::Navigation(e.to_string())),
        Err(_) => return Err(RenderError::NavigationTimeout(opts.navigation_timeout.as_millis() as u64)),
    }

    let settled = wait_until_stable(
        move || async move {
            let quiet_ms: f64 = page
                .evaluate(QUIET_FOR_MS)
                .await
                .map_err(|e| RenderError::Script(e.to_string()))?
                .into_value()
                .map_err(|e| RenderError::Script(e.to_string()))?;
            Ok(Duration::from_secs_f64(quiet_ms.max(0.0) / 1000.0))
        },
        opts,
    )
    .await?;
    tracing::debug!(url = %url, settle_ms = settled.as_millis() as u64, "page settled");

    page.content()
        .await
        .map_err(|e| RenderError::ContentRetrieval(e.to_string()))
}

/// Starts and stops [`ChromeSession`]s for the pool.
#[derive(Debug, Clone)]
pub struct ChromeManager {
    mode: BrowserMode,
    endpoint: String,
    chrome_executable: Option<PathBuf>,
    headless: bool,
    request_timeout: Duration,
}

impl ChromeManager {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            mode: config.browser_mode,
            endpoint: config.devtools_endpoint(),
            chrome_executable: config.chrome_executable.clone(),
            headless: config.headless,
            request_timeout: config.navigation_timeout(),
        }
    }

    async fn launch(&self) -> Result<(Browser, chromiumoxide::Handler, Option<TempDir>), RenderError> {
        let profile = tempfile::Builder::new().prefix("prerender-profile-").tempdir()?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .args(STARTUP_FLAGS.iter().copied())
            .request_timeout(self.request_timeout);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(RenderError::BrowserLaunch)?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        tracing::debug!(profile = %profile.path().display(), "launched browser");
        Ok((browser, handler, Some(profile)))
    }

    async fn connect(&self) -> Result<(Browser, chromiumoxide::Handler, Option<TempDir>), RenderError> {
        let (browser, handler) = Browser::connect(self.endpoint.as_str())
            .await
            .map_err(|e| RenderError::BrowserLaunch(format!("{}: {e}", self.endpoint)))?;

        tracing::debug!(endpoint = %self.endpoint, "connected to browser");
        Ok((browser, handler, None))
    }
}

#[async_trait::async_trait]
impl SessionManager for ChromeManager {
    type Session = ChromeSession;

    async fn create(&self) -> Result<ChromeSession, RenderError> {
        let (browser, mut handler, profile) = match self.mode {
            BrowserMode::Launch => self.launch().await?,
            BrowserMode::Connect => self.connect().await?,
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        Ok(ChromeSession { browser, handler, mode: self.mode, _profile: profile })
    }

    fn is_healthy(&self, session: &ChromeSession) -> bool {
        session.is_alive()
    }

    async fn destroy(&self, session: ChromeSession) {
        session.shutdown().await;
    }
}

/// Headless Chrome/Chromium renderer backed by a session pool.
pub struct HeadlessRenderer {
    pool: Pool<ChromeManager>,
}

impl HeadlessRenderer {
    /// Create a renderer. Browsers start lazily on first use.
    pub fn new(config: &AppConfig) -> Self {
        Self { pool: Pool::new(ChromeManager::new(config), config.browser_pool_size, config.keep_warm) }
    }

    pub fn pool(&self) -> &Pool<ChromeManager> {
        &self.pool
    }

    /// Shut down every idle browser.
    pub async fn shutdown(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl Renderer for HeadlessRenderer {
    async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
        let start = Instant::now();
        let lease = self.pool.checkout().await?;

        match lease.session().render(url, opts).await {
            Ok(html) => {
                self.pool.checkin(lease).await;
                Ok(RenderedPage { html, render_time_ms: start.elapsed().as_millis() as u64 })
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "render failed; discarding browser session");
                self.pool.discard(lease).await;
                Err(e)
            }
        }
    }
}
