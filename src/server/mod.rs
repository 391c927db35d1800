//! HTTP service for the extractor.
//!
//! This module provides:
//! - The axum router and shared state (`router`, `AppState`)
//! - Request handlers (`routes`)
//! - Configuration types (`config`)
//!
//! Error responses carry a JSON body of the form `{"detail": "..."}`.

pub mod config;
mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::info;

use crate::{Extractor, RecognitionError, SkaldError};

/// Room for multipart framing and headers on top of the image bytes.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<Extractor>,
    /// Use the first `X-Forwarded-For` hop as the client key.
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(extractor: Arc<Extractor>) -> Self {
        Self {
            extractor,
            trust_forwarded_for: false,
        }
    }

    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let limits = state.extractor.upload_limits();
    let body_limit = limits
        .max_bytes
        .saturating_mul(limits.max_batch_size)
        .saturating_add(BODY_LIMIT_SLACK);

    Router::new()
        .route("/", get(routes::health))
        .route("/extract-text", post(routes::extract_text))
        .route("/extract-text/batch", post(routes::extract_batch))
        .route("/cache/stats", get(routes::cache_stats))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, recognizer = state.extractor.recognizer_name(), "listening");
    }
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Key the governor counts requests under.
pub struct ClientKey(pub String);

#[axum::async_trait]
impl FromRequestParts<AppState> for ClientKey {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.trust_forwarded_for {
            let forwarded = parts
                .headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|hop| !hop.is_empty());
            if let Some(hop) = forwarded {
                return Ok(ClientKey(hop.to_owned()));
            }
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(ClientKey(peer))
    }
}

/// Handler error rendered as `{"detail": ..}` with a mapped status.
pub struct ApiError {
    status: StatusCode,
    detail: String,
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
            retry_after: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// HTTP status for a crate error.
pub fn status_for(err: &SkaldError) -> StatusCode {
    match err {
        SkaldError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        SkaldError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        SkaldError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        SkaldError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SkaldError::RecognitionFailed(RecognitionError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        SkaldError::RecognitionFailed(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<SkaldError> for ApiError {
    fn from(err: SkaldError) -> Self {
        // Whole seconds, rounded up so a client never retries early.
        let retry_after = err.retry_after().map(|d| {
            let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
            secs.max(1)
        });
        Self {
            status: status_for(&err),
            detail: err.to_string(),
            retry_after,
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self {
            status: err.status(),
            detail: err.body_text(),
            retry_after: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.detail }));
        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
