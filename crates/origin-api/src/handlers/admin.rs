//! Admin endpoints: tenant provisioning, key rotation, ledger verification

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use origin_types::{CorrelationId, OriginError, Scope, TenantId};

use crate::dto::{ApiKeyRotated, TenantCreateRequest, TenantCreated};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn create_tenant(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
    Json(request): Json<TenantCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.display_name.is_empty() {
        return Err(ApiError::new(
            OriginError::validation("display_name", "must not be empty"),
            &correlation_id,
        ));
    }

    let allowlist = request
        .ip_allowlist
        .as_ref()
        .map(|entries| serde_json::to_value(entries).unwrap_or_default());

    let tenant = state
        .db
        .tenants()
        .create(
            &request.display_name,
            allowlist,
            request.rate_limit_per_minute,
            request.rate_limit_burst,
            "default",
            1,
        )
        .await
        .map_err(|e| ApiError::new(OriginError::internal(e.to_string()), &correlation_id))?;

    let issued = state
        .api_keys
        .issue(tenant.id, &Scope::tenant_default())
        .await
        .map_err(|e| ApiError::new(OriginError::internal(e.to_string()), &correlation_id))?;

    tracing::info!(tenant_id = %tenant.id, "tenant provisioned");

    Ok(Json(TenantCreated {
        tenant_id: TenantId(tenant.id).to_prefixed_string(),
        display_name: tenant.display_name,
        api_key: issued.raw_key,
    }))
}

pub async fn rotate_api_key(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
    Path(tenant_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_tenant_id(&tenant_id, &correlation_id)?;

    state
        .db
        .tenants()
        .find_by_id(id)
        .await
        .map_err(|e| ApiError::new(OriginError::internal(e.to_string()), &correlation_id))?
        .ok_or_else(|| ApiError::new(OriginError::not_found("tenant"), &correlation_id))?;

    let issued = state
        .api_keys
        .rotate(id, &Scope::tenant_default())
        .await
        .map_err(|e| ApiError::new(OriginError::internal(e.to_string()), &correlation_id))?;

    Ok(Json(ApiKeyRotated {
        tenant_id: TenantId(id).to_prefixed_string(),
        api_key: issued.raw_key,
    }))
}

/// Surface for C7's offline verification: walks the tenant's chain and
/// reports the first violation. Integrity failures are returned, never
/// swallowed.
pub async fn verify_ledger(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
    Path(tenant_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_tenant_id(&tenant_id, &correlation_id)?;

    let verification = state
        .ledger
        .verify_chain(id)
        .await
        .map_err(|e| ApiError::new(OriginError::internal(e.to_string()), &correlation_id))?;

    if !verification.ok {
        tracing::error!(
            tenant_id = %id,
            error = verification.error.as_deref().unwrap_or("unknown"),
            "ledger chain verification failed"
        );
    }

    Ok(Json(json!({
        "tenant_id": TenantId(id).to_prefixed_string(),
        "ok": verification.ok,
        "error": verification.error,
        "events_checked": verification.events_checked,
    })))
}

fn parse_tenant_id(raw: &str, correlation_id: &CorrelationId) -> Result<uuid::Uuid, ApiError> {
    TenantId::parse(raw).map(|id| id.0).map_err(|_| {
        ApiError::new(
            OriginError::validation("tenant_id", "not a valid tenant id"),
            correlation_id,
        )
    })
}
