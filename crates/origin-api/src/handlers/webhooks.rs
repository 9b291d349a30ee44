//! Webhook management endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::SecondsFormat;
use rand::RngCore;
use serde_json::json;

use origin_auth::TenantContext;
use origin_types::{CorrelationId, OriginError, WebhookId};

use crate::dto::{WebhookCreateRequest, WebhookCreated, WebhookTestRequest};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
    Extension(TenantContext(tenant)): Extension<TenantContext>,
    Json(request): Json<WebhookCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !request.url.starts_with("http://") && !request.url.starts_with("https://") {
        return Err(ApiError::new(
            OriginError::validation("url", "must be an http(s) URL"),
            &correlation_id,
        ));
    }
    if request.events.is_empty() {
        return Err(ApiError::new(
            OriginError::validation("events", "must subscribe to at least one event"),
            &correlation_id,
        ));
    }

    let secret = request.secret.clone().unwrap_or_else(generate_secret);
    let encrypted = state
        .encryption
        .encrypt(secret.as_bytes())
        .await
        .map_err(|e| ApiError::new(OriginError::internal(e.to_string()), &correlation_id))?;

    let events_json = serde_json::to_value(&request.events)
        .map_err(|e| ApiError::new(OriginError::internal(e.to_string()), &correlation_id))?;

    let webhook = state
        .db
        .webhooks()
        .insert(tenant.id, &request.url, events_json, &encrypted)
        .await
        .map_err(|e| ApiError::new(OriginError::internal(e.to_string()), &correlation_id))?;

    Ok(Json(WebhookCreated {
        id: WebhookId(webhook.id).to_prefixed_string(),
        url: webhook.url,
        events: request.events,
        active: webhook.active,
        secret,
    }))
}

pub async fn test(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
    Extension(TenantContext(tenant)): Extension<TenantContext>,
    Json(request): Json<WebhookTestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = WebhookId::parse(&request.webhook_id).map_err(|_| {
        ApiError::new(
            OriginError::validation("webhook_id", "not a valid webhook id"),
            &correlation_id,
        )
    })?;

    let webhook = state
        .db
        .webhooks()
        .find_for_tenant(tenant.id, id.0)
        .await
        .map_err(|e| ApiError::new(OriginError::internal(e.to_string()), &correlation_id))?
        .ok_or_else(|| ApiError::new(OriginError::not_found("webhook"), &correlation_id))?;

    let response_code = state
        .dispatcher
        .send_test(&webhook, correlation_id.as_str())
        .await
        .map_err(|e| {
            ApiError::new(
                OriginError::validation("webhook_id", format!("test delivery failed: {e}")),
                &correlation_id,
            )
        })?;

    Ok(Json(json!({"delivered": true, "response_code": response_code})))
}

pub async fn deliveries(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
    Extension(TenantContext(tenant)): Extension<TenantContext>,
    Path(webhook_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = WebhookId::parse(&webhook_id).map_err(|_| {
        ApiError::new(
            OriginError::validation("webhook_id", "not a valid webhook id"),
            &correlation_id,
        )
    })?;

    // Ownership gate before listing.
    state
        .db
        .webhooks()
        .find_for_tenant(tenant.id, id.0)
        .await
        .map_err(|e| ApiError::new(OriginError::internal(e.to_string()), &correlation_id))?
        .ok_or_else(|| ApiError::new(OriginError::not_found("webhook"), &correlation_id))?;

    let deliveries = state
        .db
        .webhooks()
        .list_deliveries(id.0, 100)
        .await
        .map_err(|e| ApiError::new(OriginError::internal(e.to_string()), &correlation_id))?;

    let items: Vec<_> = deliveries
        .into_iter()
        .map(|d| {
            json!({
                "id": d.id.to_string(),
                "event_id": d.event_id.to_string(),
                "event_type": d.event_type,
                "attempt": d.attempt,
                "status": d.status,
                "response_code": d.response_code,
                "correlation_id": d.correlation_id,
                "scheduled_at": d.scheduled_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                "completed_at": d.completed_at.map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true)),
            })
        })
        .collect();

    Ok(Json(json!({"deliveries": items})))
}

fn generate_secret() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("whsec_{}", hex::encode(bytes))
}
