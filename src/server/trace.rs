//! Per-request trace logging
//!
//! Every request logs method, path, status, and latency. With debug
//! enabled the response body is buffered and logged too, which is the
//! cheapest way to see exactly what a confused kubectl was told.

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use super::handlers::AppState;

/// Upper bound on how much of a response body the debug trace will buffer.
const TRACE_BODY_LIMIT: usize = 4 * 1024 * 1024;

pub async fn trace_requests(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let start = Instant::now();

    let response = next.run(req).await;
    let elapsed = start.elapsed();
    let status = response.status();

    if !state.debug {
        tracing::info!(%method, %path, query = query.as_deref().unwrap_or(""), %status, ?elapsed, "request");
        return response;
    }

    let (parts, body) = response.into_parts();
    match to_bytes(body, TRACE_BODY_LIMIT).await {
        Ok(bytes) => {
            tracing::debug!(
                %method,
                %path,
                query = query.as_deref().unwrap_or(""),
                %status,
                ?elapsed,
                body = %String::from_utf8_lossy(&bytes),
                "request"
            );
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(err) => {
            tracing::debug!(%method, %path, %status, %err, "request (body not captured)");
            Response::from_parts(parts, Body::empty())
        }
    }
}
