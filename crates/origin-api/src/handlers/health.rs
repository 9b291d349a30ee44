//! Health, readiness, and metrics endpoints
//!
//! `/health` is unconditional liveness. `/ready` verifies the database,
//! migration head, cache, blob bucket, and (outside development) that the
//! signer can produce its public key; any failure returns 503 with the
//! per-check map.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub checks: BTreeMap<&'static str, bool>,
}

pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();

    checks.insert("database", state.db.ping().await.is_ok());
    checks.insert(
        "migrations",
        state.db.migrations_at_head().await.unwrap_or(false),
    );
    checks.insert("cache", state.db.cache.ping().await.is_ok());
    checks.insert("blob_store", state.blob.bucket_exists().await.unwrap_or(false));
    if !state.environment.is_development() {
        checks.insert("signer", !state.signer.jwks().keys.is_empty());
    }

    let ready = checks.values().all(|ok| *ok);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReadyResponse { ready, checks }))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
