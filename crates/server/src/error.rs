//! HTTP mapping for pipeline errors.
//!
//! Error responses carry no body; the cause is logged instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use prerender_core::Error;

/// Failure of a single prerender request.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error(transparent)]
    Prerender(#[from] Error),

    /// The pipeline task panicked or was cancelled.
    #[error("PIPELINE_ABORTED: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::Prerender(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            HttpError::Prerender(err) if err.is_storage() => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Prerender(err) if err.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            HttpError::Prerender(Error::RenderDisabled) => StatusCode::SERVICE_UNAVAILABLE,
            HttpError::Prerender(_) => StatusCode::BAD_GATEWAY,
            HttpError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        } else {
            tracing::error!(status = status.as_u16(), error = %self, "prerender failed");
        }
        status.into_response()
    }
}
