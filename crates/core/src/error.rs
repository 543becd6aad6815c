//! Unified error types for the prerender service.
//!
//! Every variant renders as `CODE: detail` so log lines and HTTP mappings
//! can key off a stable prefix.

use tokio_rusqlite::rusqlite;

/// Unified error types for the prerender service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request host is not covered by the configured allow-pattern,
    /// or no allow-pattern is configured at all.
    #[error("HOST_NOT_ALLOWED: {0}")]
    HostNotAllowed(String),

    /// The host/path pair does not form a usable canonical URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// The origin metadata probe failed and policy says to fail the request.
    #[error("ORIGIN_PROBE_FAILED: {0}")]
    OriginProbe(String),

    /// The browser could not navigate to the page.
    #[error("NAVIGATION_FAILED: {0}")]
    NavigationFailed(String),

    /// Navigation did not complete within the configured timeout.
    #[error("NAVIGATION_TIMEOUT: {0}ms")]
    NavigationTimeout(u64),

    /// The DOM never stayed quiet long enough within the stability timeout.
    #[error("STABILITY_TIMEOUT: {0}ms")]
    StabilityTimeout(u64),

    /// Render mode is disabled in this build.
    #[error("RENDER_DISABLED")]
    RenderDisabled,

    /// Any other browser-side failure.
    #[error("RENDER_FAILED: {0}")]
    RenderFailed(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl Error {
    /// Whether the failure was caused by the caller's input rather than
    /// by the service or one of its collaborators.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::HostNotAllowed(_) | Error::InvalidUrl(_))
    }

    /// Whether the failure was a configured timeout expiring.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::NavigationTimeout(_) | Error::StabilityTimeout(_))
    }

    /// Whether the failure is the store's.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Database(_) | Error::MigrationFailed(_))
    }
}
