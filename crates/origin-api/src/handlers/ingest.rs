//! POST /v1/ingest

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Extension, Json,
};

use origin_auth::TenantContext;
use origin_engine::IngestRequest;
use origin_types::CorrelationId;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
    Extension(TenantContext(tenant)): Extension<TenantContext>,
    headers: HeaderMap,
    Json(request): Json<IngestRequest>,
) -> Result<Response, ApiError> {
    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    let outcome = state
        .pipeline
        .ingest(&tenant, idempotency_key, &request, &correlation_id)
        .await
        .map_err(|e| ApiError::new(e, &correlation_id))?;

    if !outcome.replayed {
        // The decision counter only moves on fresh decisions.
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&outcome.body) {
            if let Some(decision) = value
                .get("decision")
                .and_then(|d| d.as_str())
                .and_then(|d| d.parse().ok())
            {
                state.metrics.record_decision(decision);
            }
        }
    }

    // Stored bytes are returned verbatim so replays are byte-identical.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(outcome.body))
        .map_err(|e| ApiError::new(origin_types::OriginError::internal(e.to_string()), &correlation_id))
}
