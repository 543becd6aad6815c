//! Client code for the prerender service.
//!
//! This crate talks to the outside world on behalf of the cache: origin
//! metadata probes, freshness decisions, and headless browser rendering.

pub mod fetch;
pub mod freshness;
pub mod render;

pub use fetch::{FetchConfig, HeadProbe, UrlError, canonical_url};
pub use freshness::{Freshness, FreshnessChecker, OriginProbe, ProbeError};
pub use render::{DisabledRenderer, RenderError, RenderOptions, RenderedPage, Renderer};

#[cfg(feature = "render")]
pub use render::HeadlessRenderer;
