//! HTTP surface: a single endpoint taking `host` and `path` parameters.
//!
//! Parameters are read from the query string for every method. An
//! `application/x-www-form-urlencoded` body is merged on top, and a key
//! present in the body wins over the same key in the query.

use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Query, State};
use axum::response::Html;
use axum::routing::any;
use serde::Deserialize;

use crate::error::HttpError;
use crate::prerender::Prerenderer;

/// Request parameters from one source (query string or form body).
#[derive(Debug, Default, Deserialize)]
pub struct PrerenderParams {
    pub host: Option<String>,
    pub path: Option<String>,
}

impl PrerenderParams {
    /// Layer `body` over `self`. Keys absent from both become empty strings.
    pub fn merge(self, body: PrerenderParams) -> (String, String) {
        (
            body.host.or(self.host).unwrap_or_default(),
            body.path.or(self.path).unwrap_or_default(),
        )
    }
}

pub fn router(prerenderer: Arc<Prerenderer>) -> Router {
    Router::new().route("/", any(prerender)).with_state(prerenderer)
}

async fn prerender(
    State(prerenderer): State<Arc<Prerenderer>>, Query(query): Query<PrerenderParams>,
    body: Result<Form<PrerenderParams>, FormRejection>,
) -> Result<Html<String>, HttpError> {
    let body = match body {
        Ok(Form(body)) => body,
        Err(e) => {
            tracing::debug!(reason = %e, "no form body; using query parameters");
            PrerenderParams::default()
        }
    };
    let (host, path) = query.merge(body);

    // The pipeline runs detached so a client hanging up cannot interrupt a
    // render or store write midway.
    let task = tokio::spawn(async move { prerenderer.prerender(&host, &path).await });
    let html = task.await??;
    Ok(Html(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use prerender_core::ProbeFailurePolicy;
    use tower::ServiceExt;

    use crate::prerender::tests::{FakeRenderer, harness, harness_with};

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_disallowed_host_is_bad_request() {
        let h = harness(Some(r"^example\.com$"));
        let app = router(h.prerenderer.clone());

        let response = app
            .oneshot(Request::get("/?host=evil.com&path=/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.is_empty());
        assert!(!h.db_path().exists());
    }

    #[tokio::test]
    async fn test_missing_params_are_bad_request() {
        let h = harness(Some(r"example\.com"));
        let app = router(h.prerenderer.clone());

        let response = app.oneshot(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_query_request_returns_html() {
        let h = harness(Some(r"example\.com"));
        let app = router(h.prerenderer.clone());

        let response = app
            .oneshot(Request::get("/?host=example.com&path=%2Fpage%3Fq%3D1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
        assert_eq!(body_string(response).await, "<html>v1</html>");
        assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_form_body_request_returns_html() {
        let h = harness(Some(r"example\.com"));
        let app = router(h.prerenderer.clone());

        let request = Request::post("/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("host=example.com&path=%2F"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<html>v1</html>");
    }

    #[tokio::test]
    async fn test_render_failure_is_bad_gateway() {
        let h = harness(Some(r"example\.com"));
        h.renderer.fail.store(true, Ordering::SeqCst);
        let app = router(h.prerenderer.clone());

        let response = app
            .oneshot(Request::get("/?host=example.com&path=/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(body_string(response).await.is_empty());
    }

    #[test]
    fn test_body_params_override_query() {
        let query = PrerenderParams { host: Some("query.com".into()), path: Some("/q".into()) };
        let body = PrerenderParams { host: Some("body.com".into()), path: None };
        assert_eq!(query.merge(body), ("body.com".to_string(), "/q".to_string()));
        assert_eq!(PrerenderParams::default().merge(PrerenderParams::default()), (String::new(), String::new()));
    }

    #[tokio::test]
    async fn test_post_with_query_params_returns_html() {
        let h = harness(Some(r"example\.com"));
        let app = router(h.prerenderer.clone());

        let response = app
            .oneshot(Request::post("/?host=example.com&path=/page").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<html>v1</html>");
        assert_eq!(h.rows("https://example.com/page").await.len(), 1);
    }

    #[tokio::test]
    async fn test_form_body_overrides_query() {
        let h = harness(Some(r"^example\.com$"));
        let app = router(h.prerenderer.clone());

        let request = Request::post("/?host=evil.com&path=/ignored")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("host=example.com"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.rows("https://example.com/ignored").await.len(), 1);
    }

    #[tokio::test]
    async fn test_client_disconnect_still_stores_render() {
        let renderer = FakeRenderer { delay: Duration::from_millis(500), ..FakeRenderer::new("<html>v1</html>") };
        let h = harness_with(Some(r"example\.com"), ProbeFailurePolicy::ServeCached, renderer);
        let app = router(h.prerenderer.clone());

        let request = Request::get("/?host=example.com&path=/slow").body(Body::empty()).unwrap();
        // The client gives up while the render is still running.
        let abandoned = tokio::time::timeout(Duration::from_millis(100), app.oneshot(request)).await;
        assert!(abandoned.is_err());
        assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 1);

        let mut rows = Vec::new();
        for _ in 0..100 {
            rows = h.rows("https://example.com/slow").await;
            if !rows.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].html, "<html>v1</html>");
    }
}
