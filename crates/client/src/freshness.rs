//! Revalidation of cached renders against the live origin.
//!
//! An entry is stale only when the origin's `Last-Modified` is strictly
//! newer than the entry's `updated_at`. When the origin cannot answer, the
//! configured [`ProbeFailurePolicy`] decides.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use prerender_core::{Error, ProbeFailurePolicy};

/// Errors that can occur while probing the origin.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// The request could not be sent or no response arrived.
    #[error("probe request failed: {0}")]
    Request(String),

    /// `Last-Modified` was present but not a valid HTTP date.
    #[error("invalid Last-Modified header: {0}")]
    InvalidHeader(String),
}

/// Source of an origin's declared modification time.
#[async_trait]
pub trait OriginProbe: Send + Sync {
    /// Unix seconds from `Last-Modified`, or None when the origin omits it.
    async fn last_modified(&self, url: &Url) -> Result<Option<i64>, ProbeError>;
}

/// Outcome of a freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Serve the cached HTML unchanged.
    Fresh,
    /// Render again and replace the entry.
    Stale,
}

/// Compares cached entries against the origin.
#[derive(Clone)]
pub struct FreshnessChecker {
    probe: Arc<dyn OriginProbe>,
    policy: ProbeFailurePolicy,
}

impl FreshnessChecker {
    pub fn new(probe: Arc<dyn OriginProbe>, policy: ProbeFailurePolicy) -> Self {
        Self { probe, policy }
    }

    /// Decide whether the entry rendered at `updated_at` still reflects `url`.
    ///
    /// # Errors
    ///
    /// Returns `Error::OriginProbe` only when the origin gave no usable
    /// answer and the policy is [`ProbeFailurePolicy::Fail`].
    pub async fn check(&self, url: &Url, updated_at: i64) -> Result<Freshness, Error> {
        let unknown = match self.probe.last_modified(url).await {
            Ok(Some(modified)) if modified > updated_at => {
                tracing::info!(url = %url, origin_modified = modified, updated_at, "cached render is stale");
                return Ok(Freshness::Stale);
            }
            Ok(Some(modified)) => {
                tracing::debug!(url = %url, origin_modified = modified, updated_at, "cached render is fresh");
                return Ok(Freshness::Fresh);
            }
            Ok(None) => "origin sent no Last-Modified header".to_string(),
            Err(e) => e.to_string(),
        };

        match self.policy {
            ProbeFailurePolicy::ServeCached => {
                tracing::warn!(url = %url, reason = %unknown, "freshness unknown; serving cached render");
                Ok(Freshness::Fresh)
            }
            ProbeFailurePolicy::Rerender => {
                tracing::warn!(url = %url, reason = %unknown, "freshness unknown; rendering again");
                Ok(Freshness::Stale)
            }
            ProbeFailurePolicy::Fail => Err(Error::OriginProbe(unknown)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProbe {
        answer: Result<Option<i64>, ProbeError>,
        calls: AtomicUsize,
    }

    impl FixedProbe {
        fn new(answer: Result<Option<i64>, ProbeError>) -> Arc<Self> {
            Arc::new(Self { answer, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl OriginProbe for FixedProbe {
        async fn last_modified(&self, _url: &Url) -> Result<Option<i64>, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    fn url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[tokio::test]
    async fn test_newer_origin_is_stale() {
        let checker = FreshnessChecker::new(FixedProbe::new(Ok(Some(1001))), ProbeFailurePolicy::ServeCached);
        assert_eq!(checker.check(&url(), 1000).await.unwrap(), Freshness::Stale);
    }

    #[tokio::test]
    async fn test_equal_timestamp_is_fresh() {
        let checker = FreshnessChecker::new(FixedProbe::new(Ok(Some(1000))), ProbeFailurePolicy::Rerender);
        assert_eq!(checker.check(&url(), 1000).await.unwrap(), Freshness::Fresh);
    }

    #[tokio::test]
    async fn test_older_origin_is_fresh() {
        let checker = FreshnessChecker::new(FixedProbe::new(Ok(Some(10))), ProbeFailurePolicy::Fail);
        assert_eq!(checker.check(&url(), 1000).await.unwrap(), Freshness::Fresh);
    }

    #[tokio::test]
    async fn test_missing_header_serve_cached() {
        let checker = FreshnessChecker::new(FixedProbe::new(Ok(None)), ProbeFailurePolicy::ServeCached);
        assert_eq!(checker.check(&url(), 1000).await.unwrap(), Freshness::Fresh);
    }

    #[tokio::test]
    async fn test_probe_error_rerender() {
        let probe = FixedProbe::new(Err(ProbeError::Request("connection refused".into())));
        let checker = FreshnessChecker::new(probe.clone(), ProbeFailurePolicy::Rerender);
        assert_eq!(checker.check(&url(), 1000).await.unwrap(), Freshness::Stale);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_error_fail() {
        let probe = FixedProbe::new(Err(ProbeError::InvalidHeader("garbage".into())));
        let checker = FreshnessChecker::new(probe, ProbeFailurePolicy::Fail);
        let result = checker.check(&url(), 1000).await;
        assert!(matches!(result, Err(Error::OriginProbe(msg)) if msg.contains("garbage")));
    }

    #[tokio::test]
    async fn test_missing_header_fail() {
        let checker = FreshnessChecker::new(FixedProbe::new(Ok(None)), ProbeFailurePolicy::Fail);
        assert!(matches!(checker.check(&url(), 1000).await, Err(Error::OriginProbe(_))));
    }
}
