//! prerender server entry point.
//!
//! Boots the HTTP endpoint that serves cached or freshly rendered HTML.
//! Logs are JSON on stderr, filtered by `RUST_LOG`.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use prerender_client::{FetchConfig, HeadProbe};
use prerender_core::AppConfig;

mod error;
mod handler;
mod inflight;
mod prerender;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        db_path = %config.db_path.display(),
        browser_mode = ?config.browser_mode,
        pool_size = config.browser_pool_size,
        "starting prerender server"
    );

    let probe = Arc::new(HeadProbe::new(&FetchConfig::from(&config))?);

    #[cfg(feature = "render")]
    let renderer = Arc::new(prerender_client::HeadlessRenderer::new(&config));
    #[cfg(not(feature = "render"))]
    let renderer = Arc::new(prerender_client::DisabledRenderer);

    let prerenderer = Arc::new(prerender::Prerenderer::new(&config, probe, renderer.clone())?);

    let listener = TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, handler::router(prerenderer))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    #[cfg(feature = "render")]
    renderer.shutdown().await;

    tracing::info!("prerender server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
