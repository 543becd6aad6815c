//! Origin metadata probe.
//!
//! ### URL Canonicalization
//! - Build `https://{host}{path}`, lowercase host, remove fragments
//! - Preserve query string
//! - Reject hosts that smuggle userinfo, ports or paths
//!
//! ### Probe
//! - One `HEAD` request per check, no body transfer
//! - `Last-Modified` parsed as an RFC 1123 date into Unix seconds
//! - Status codes are not interpreted: only the header matters

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonical_url};

use crate::freshness::{OriginProbe, ProbeError};
use prerender_core::{AppConfig, Error};

/// Configuration for the probe client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "prerender/0.1")
    pub user_agent: String,

    /// Request timeout; transport default when None
    pub timeout: Option<Duration>,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "prerender/0.1".to_string(), timeout: None, max_redirects: 5 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.probe_timeout(), ..Default::default() }
    }
}

/// Issues `HEAD` requests against origins to read `Last-Modified`.
pub struct HeadProbe {
    http: Client,
}

impl HeadProbe {
    /// Create a new probe client with the given configuration.
    pub fn new(config: &FetchConfig) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::OriginProbe(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

/// Parse an HTTP date header into Unix seconds.
///
/// Accepts the IMF-fixdate form (`Wed, 21 Oct 2015 07:28:00 GMT`) and
/// numeric offsets.
pub fn parse_http_date(value: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.timestamp())
}

#[async_trait]
impl OriginProbe for HeadProbe {
    async fn last_modified(&self, url: &::url::Url) -> Result<Option<i64>, ProbeError> {
        let start = Instant::now();
        let response = self
            .http
            .head(url.as_str())
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let status = response.status();
        let header = match response.headers().get(header::LAST_MODIFIED) {
            Some(value) => value,
            None => {
                tracing::debug!(url = %url, status = status.as_u16(), "origin sent no Last-Modified");
                return Ok(None);
            }
        };

        let raw = header
            .to_str()
            .map_err(|e| ProbeError::InvalidHeader(e.to_string()))?;
        let modified = parse_http_date(raw).ok_or_else(|| ProbeError::InvalidHeader(raw.to_string()))?;

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            origin_modified = modified,
            probe_ms = start.elapsed().as_millis() as u64,
            "probed origin"
        );

        Ok(Some(modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    fn probe() -> HeadProbe {
        HeadProbe::new(&FetchConfig::default()).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "prerender/0.1");
        assert_eq!(config.timeout, None);
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "bot/2".into(), probe_timeout_ms: Some(1500), ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "bot/2");
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_parse_http_date() {
        assert_eq!(parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT"), Some(1_445_412_480));
        assert_eq!(parse_http_date("Wed, 21 Oct 2015 09:28:00 +0200"), Some(1_445_412_480));
        assert_eq!(parse_http_date("yesterday"), None);
    }

    #[tokio::test]
    async fn test_last_modified_present() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("HEAD").path("/page");
                then.status(200).header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT");
            })
            .await;

        let url = ::url::Url::parse(&server.url("/page")).unwrap();
        let modified = probe().last_modified(&url).await.unwrap();

        assert_eq!(modified, Some(1_445_412_480));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_last_modified_missing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("HEAD").path("/page");
                then.status(200);
            })
            .await;

        let url = ::url::Url::parse(&server.url("/page")).unwrap();
        assert_eq!(probe().last_modified(&url).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_modified_unparseable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("HEAD").path("/page");
                then.status(200).header("Last-Modified", "not a date");
            })
            .await;

        let url = ::url::Url::parse(&server.url("/page")).unwrap();
        let result = probe().last_modified(&url).await;
        assert!(matches!(result, Err(ProbeError::InvalidHeader(_))));
    }

    #[tokio::test]
    async fn test_last_modified_read_on_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("HEAD").path("/gone");
                then.status(404).header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT");
            })
            .await;

        let url = ::url::Url::parse(&server.url("/gone")).unwrap();
        assert_eq!(probe().last_modified(&url).await.unwrap(), Some(1_445_412_480));
    }

    #[tokio::test]
    async fn test_unreachable_origin() {
        let url = ::url::Url::parse("http://127.0.0.1:1/page").unwrap();
        let result = probe().last_modified(&url).await;
        assert!(matches!(result, Err(ProbeError::Request(_))));
    }
}
