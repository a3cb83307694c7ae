//! Axum router and HTTP handlers for trk-daemon.
//!
//! `build_router` is the single entry point; `main.rs` attaches middleware
//! layers afterwards so tests can drive the bare router.

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error};
use trk_collector::CollectorError;
use trk_consumers::StreamedTrace;

use crate::{
    api_types::{ErrorResponse, HealthResponse},
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/traces/stream", get(trace_stream))
        .route("/api/collector/start/:tracking_code", post(start))
        .route("/api/collector/track", post(track))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

pub(crate) struct ApiError(CollectorError);

impl From<CollectorError> for ApiError {
    fn from(e: CollectorError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        match &self.0 {
            CollectorError::Storage(detail) => error!("storage failure: {detail}"),
            CollectorError::Internal(detail) => error!("internal failure: {detail}"),
            _ => {}
        }
        // Consumer statuses are passed through as long as HTTP can carry them.
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            code,
            Json(ErrorResponse {
                message: self.0.public_message().to_string(),
                status,
            }),
        )
            .into_response()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: axum::http::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /api/collector/start/:tracking_code
// ---------------------------------------------------------------------------

pub(crate) async fn start(
    State(st): State<Arc<AppState>>,
    Path(tracking_code): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    // The body is optional; only `{"anonymous": ...}` is read from it.
    let body: Option<Value> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(serde_json::from_slice(&body).map_err(|e| {
            CollectorError::BadRequest(format!("Request body is not valid JSON: {e}"))
        })?)
    };

    let outcome = st
        .collector
        .start(&tracking_code, header_str(&headers, AUTHORIZATION), body.as_ref())
        .await?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

// ---------------------------------------------------------------------------
// POST /api/collector/track
// ---------------------------------------------------------------------------

pub(crate) async fn track(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let token = header_str(&headers, AUTHORIZATION)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CollectorError::Unauthorized("Authorization header required".to_string()))?;

    // Unparseable JSON is treated like any other non-array body, but only
    // after the token has been validated by the collector.
    let statements = serde_json::from_slice::<Value>(&body).unwrap_or_else(|e| {
        debug!("track body is not JSON: {e}");
        Value::Null
    });

    let ack = st.collector.track(token, statements).await?;
    Ok((StatusCode::OK, Json(ack)).into_response())
}

// ---------------------------------------------------------------------------
// GET /v1/traces/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn trace_stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let events = broadcast_to_sse(st.stream.subscribe());
    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<StreamedTrace>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event("trace").data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_http_consumer_status_still_renders() {
        let r = ApiError(CollectorError::Consumer {
            status: 700,
            message: "x".into(),
        })
        .into_response();
        assert_eq!(r.status().as_u16(), 700);
    }
}
