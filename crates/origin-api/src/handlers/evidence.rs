//! Evidence pack endpoints
//!
//! POST enqueues (202, or 503 with Retry-After when the broker is down);
//! GET polls (202 pending with Retry-After, 200 ready with signed URLs,
//! 200 failed with the recorded error code). The download route streams
//! artifact bytes directly, which is how file:// URLs from the development
//! blob store are served.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;

use origin_auth::TenantContext;
use origin_evidence::{EvidenceFormat, PollOutcome};
use origin_types::{CorrelationId, EvidencePackStatus, OriginError};

use crate::dto::{EvidencePackAccepted, EvidencePackReady, EvidencePackRequest};
use crate::error::{from_evidence, ApiError};
use crate::state::AppState;

pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
    Extension(TenantContext(tenant)): Extension<TenantContext>,
    Json(request): Json<EvidencePackRequest>,
) -> Result<Response, ApiError> {
    let certificate_id = parse_certificate_id(&request.certificate_id, &correlation_id)?;
    let formats = request
        .parsed_formats()
        .map_err(|e| from_evidence(e, &correlation_id))?;

    let outcome = state
        .evidence
        .request(tenant.id, certificate_id, &formats, correlation_id.as_str())
        .await
        .map_err(|e| from_evidence(e, &correlation_id))?;

    let task_status = outcome.task_status.map(|s| s.as_str().to_string());
    let body = EvidencePackAccepted {
        status: outcome.status.as_str().to_string(),
        task_id: outcome.task_id,
        task_status: task_status.clone(),
        task_state: task_status,
        pipeline_event: outcome.pipeline_event.as_str().to_string(),
        poll_url: format!("/v1/evidence-packs/{}", request.certificate_id),
        retry_after_seconds: outcome.retry_after_seconds,
    };

    let status = match outcome.status {
        EvidencePackStatus::Ready => StatusCode::OK,
        _ => StatusCode::ACCEPTED,
    };
    Ok((status, Json(body)).into_response())
}

pub async fn poll(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
    Extension(TenantContext(tenant)): Extension<TenantContext>,
    Path(certificate_id): Path<String>,
) -> Result<Response, ApiError> {
    let certificate_id = parse_certificate_id(&certificate_id, &correlation_id)?;

    let outcome = state
        .evidence
        .poll(tenant.id, certificate_id)
        .await
        .map_err(|e| from_evidence(e, &correlation_id))?;

    let response = match outcome {
        PollOutcome::Pending {
            task_id,
            task_status,
            retry_after_seconds,
        } => {
            let task_status = task_status.map(|s| s.as_str().to_string());
            let body = json!({
                "status": "pending",
                "task_id": task_id,
                "task_status": task_status,
                "task_state": task_status,
                "retry_after_seconds": retry_after_seconds,
            });
            let mut response = (StatusCode::ACCEPTED, Json(body)).into_response();
            if let Ok(value) = retry_after_seconds.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
        PollOutcome::Ready {
            signed_urls,
            artifact_hashes,
            artifact_sizes,
        } => (
            StatusCode::OK,
            Json(EvidencePackReady {
                status: "ready".to_string(),
                signed_urls,
                artifact_hashes,
                artifact_sizes,
            }),
        )
            .into_response(),
        PollOutcome::Failed { error_code } => (
            StatusCode::OK,
            Json(json!({"status": "failed", "error_code": error_code})),
        )
            .into_response(),
    };
    Ok(response)
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
    Extension(TenantContext(tenant)): Extension<TenantContext>,
    Path((certificate_id, format)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let certificate_id = parse_certificate_id(&certificate_id, &correlation_id)?;
    let format: EvidenceFormat = format
        .parse()
        .map_err(|e| from_evidence(e, &correlation_id))?;

    let bytes = state
        .evidence
        .artifact_for_download(tenant.id, certificate_id, format)
        .await
        .map_err(|e| from_evidence(e, &correlation_id))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, format.content_type())],
        bytes,
    )
        .into_response())
}

fn parse_certificate_id(
    raw: &str,
    correlation_id: &CorrelationId,
) -> Result<uuid::Uuid, ApiError> {
    origin_types::CertificateId::parse(raw)
        .map(|id| id.0)
        .map_err(|_| {
            ApiError::new(
                OriginError::validation("certificate_id", "not a valid certificate id"),
                correlation_id,
            )
        })
}
