//! Canonical cache-key URLs built from a request's host and path.

/// Error type for URL construction failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty host")]
    EmptyHost,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("host {requested:?} resolves to authority {parsed:?}")]
    HostMismatch { requested: String, parsed: String },
}

/// Build the canonical `https://{host}{path}` URL used as the cache key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace from host and path
/// 2. Prefix `/` to a non-empty path that lacks one
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
///
/// The parsed authority must be exactly the requested host, so a `host`
/// carrying userinfo, a port or a path cannot redirect the render elsewhere.
pub fn canonical_url(host: &str, path: &str) -> Result<url::Url, UrlError> {
    let host = host.trim().to_lowercase();
    if host.is_empty() {
        return Err(UrlError::EmptyHost);
    }

    let path = path.trim();
    let url_str = if path.is_empty() || path.starts_with('/') || path.starts_with('?') {
        format!("https://{host}{path}")
    } else {
        format!("https://{host}/{path}")
    };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    let authority_matches = parsed.host_str() == Some(host.as_str())
        && parsed.port().is_none()
        && parsed.username().is_empty()
        && parsed.password().is_none();
    if !authority_matches {
        return Err(UrlError::HostMismatch {
            requested: host,
            parsed: parsed.host_str().unwrap_or_default().to_string(),
        });
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

impl From<UrlError> for prerender_core::Error {
    fn from(err: UrlError) -> Self {
        prerender_core::Error::InvalidUrl(err.to_string())
    }
}
