//! Certificate, JWKS, and model status endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::SecondsFormat;
use serde_json::json;

use origin_auth::TenantContext;
use origin_types::{CertificateId, CorrelationId, OriginError, UploadId};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn get_certificate(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
    Extension(TenantContext(tenant)): Extension<TenantContext>,
    Path(certificate_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = CertificateId::parse(&certificate_id).map_err(|_| {
        ApiError::new(
            OriginError::validation("certificate_id", "not a valid certificate id"),
            &correlation_id,
        )
    })?;

    let certificate = state
        .db
        .certificates()
        .find_for_tenant(tenant.id, id.0)
        .await
        .map_err(|e| ApiError::new(OriginError::internal(e.to_string()), &correlation_id))?
        .ok_or_else(|| ApiError::new(OriginError::not_found("certificate"), &correlation_id))?;

    Ok(Json(json!({
        "certificate_id": CertificateId(certificate.id).to_prefixed_string(),
        "tenant_id": certificate.tenant_id.to_string(),
        "upload_id": UploadId(certificate.upload_id).to_prefixed_string(),
        "policy_version": certificate.policy_version,
        "inputs_hash": certificate.inputs_hash,
        "outputs_hash": certificate.outputs_hash,
        "ledger_hash": certificate.ledger_hash,
        "key_id": certificate.key_id,
        "alg": certificate.alg,
        "signature": certificate.signature,
        "signature_encoding": certificate.signature_encoding,
        "issued_at": certificate.issued_at.to_rfc3339_opts(SecondsFormat::Micros, true),
    })))
}

pub async fn jwks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.signer.jwks())
}

pub async fn models_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.inference.status())
}
