//! The prerender pipeline: host gate, cache lookup, freshness, render, store.

use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use prerender_client::{Freshness, FreshnessChecker, OriginProbe, RenderOptions, Renderer, canonical_url};
use prerender_core::{AppConfig, CacheDb, ConfigError, Error, HostValidator};

use crate::inflight::InFlight;

/// Serves rendered HTML for `(host, path)` requests.
pub struct Prerenderer {
    hosts: HostValidator,
    db_path: PathBuf,
    freshness: FreshnessChecker,
    renderer: Arc<dyn Renderer>,
    render_opts: RenderOptions,
    inflight: InFlight,
}

impl Prerenderer {
    pub fn new(
        config: &AppConfig, probe: Arc<dyn OriginProbe>, renderer: Arc<dyn Renderer>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            hosts: HostValidator::from_config(config)?,
            db_path: config.db_path.clone(),
            freshness: FreshnessChecker::new(probe, config.probe_failure),
            renderer,
            render_opts: RenderOptions::from(config),
            inflight: InFlight::new(),
        })
    }

    /// Return the rendered HTML for `https://{host}{path}`.
    ///
    /// A cached entry is served as-is while the origin reports no newer
    /// `Last-Modified`. Otherwise the page is rendered and committed before
    /// it is returned. A failed render never touches the store.
    ///
    /// # Errors
    ///
    /// `HostNotAllowed` and `InvalidUrl` are raised before the store is
    /// opened. Render, probe and store failures propagate unchanged.
    pub async fn prerender(&self, host: &str, path: &str) -> Result<String, Error> {
        self.hosts.check(host)?;
        let url = canonical_url(host, path)?;

        let _lease = self.inflight.acquire(url.as_str()).await;
        let store = CacheDb::open(&self.db_path).await?;

        let Some(entry) = store.lookup(url.as_str()).await? else {
            tracing::info!(host, url = %url, "cache miss; rendering");
            let html = self.render(&url).await?;
            let id = store.insert(url.as_str(), &html).await?;
            tracing::info!(url = %url, entry_id = id, "stored render");
            return Ok(html);
        };

        match self.freshness.check(&url, entry.updated_at).await? {
            Freshness::Fresh => {
                tracing::info!(url = %url, entry_id = entry.id, "serving cached render");
                Ok(entry.html)
            }
            Freshness::Stale => {
                let html = self.render(&url).await?;
                let id = store.replace(entry.id, url.as_str(), &html).await?;
                tracing::info!(url = %url, entry_id = id, replaced = entry.id, "replaced stale render");
                Ok(html)
            }
        }
    }

    async fn render(&self, url: &Url) -> Result<String, Error> {
        let page = self.renderer.render(url, &self.render_opts).await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "render failed");
            Error::from(e)
        })?;
        tracing::info!(url = %url, render_ms = page.render_time_ms, bytes = page.html.len(), "rendered page");
        Ok(page.html)
    }
}
