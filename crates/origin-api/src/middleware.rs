//! API-level middleware
//!
//! Correlation id propagation and request accounting. The admission stack
//! (auth, scope, rate limit, IP) lives in origin-auth; these layers wrap
//! outside it so even denied requests carry a correlation id.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use origin_types::CorrelationId;

use crate::state::AppState;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Accept or mint the request's correlation id; echo it on the response.
pub async fn correlation(mut req: Request, next: Next) -> Response {
    let correlation_id = CorrelationId::from_header(
        req.headers()
            .get(CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok()),
    );
    req.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

/// Request timing and the request counter.
pub async fn timing(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    state.metrics.record_request();

    let response = next.run(req).await;

    let elapsed = start.elapsed();
    if elapsed.as_millis() > 1000 {
        tracing::warn!(
            method = %method,
            uri = %uri,
            elapsed_ms = elapsed.as_millis(),
            "slow request"
        );
    } else {
        tracing::debug!(
            method = %method,
            uri = %uri,
            elapsed_ms = elapsed.as_millis(),
            status = response.status().as_u16(),
            "request completed"
        );
    }
    response
}
