//! Route table and middleware assembly
//!
//! Layer order is normative: correlation runs first, then authentication,
//! scope, rate limit, and the IP allowlist, then the route handler. With
//! axum, the layer added last runs first, so the stack is attached in
//! reverse.

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use origin_auth::middleware as admission;

use crate::handlers;
use crate::middleware as api_middleware;
use crate::state::AppState;

/// Build the full router with the admission stack attached.
pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_ctx = state.auth.clone();

    Router::new()
        // Public
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        // Decision path
        .route("/v1/ingest", post(handlers::ingest::ingest))
        // Evidence
        .route("/v1/evidence-packs", post(handlers::evidence::create))
        .route("/v1/evidence-packs/:id", get(handlers::evidence::poll))
        .route(
            "/v1/evidence-packs/:id/download/:format",
            get(handlers::evidence::download),
        )
        // Certificates & keys
        .route("/v1/certificates/:id", get(handlers::certificates::get_certificate))
        .route("/v1/keys/jwks.json", get(handlers::certificates::jwks))
        .route("/v1/models/status", get(handlers::certificates::models_status))
        // Webhooks
        .route("/v1/webhooks", post(handlers::webhooks::create))
        .route("/v1/webhooks/test", post(handlers::webhooks::test))
        .route(
            "/v1/webhooks/:id/deliveries",
            get(handlers::webhooks::deliveries),
        )
        // Admin
        .route("/admin/tenants", post(handlers::admin::create_tenant))
        .route(
            "/admin/tenants/:id/rotate-api-key",
            post(handlers::admin::rotate_api_key),
        )
        .route(
            "/admin/ledger/:tenant_id/verify",
            get(handlers::admin::verify_ledger),
        )
        // Admission stack, innermost to outermost.
        .layer(from_fn_with_state(
            auth_ctx.clone(),
            admission::enforce_ip_allowlist,
        ))
        .layer(from_fn_with_state(
            auth_ctx.clone(),
            admission::enforce_rate_limit,
        ))
        .layer(from_fn(admission::enforce_scope))
        .layer(from_fn_with_state(auth_ctx, admission::authenticate))
        .layer(from_fn_with_state(state.clone(), api_middleware::timing))
        .layer(from_fn(api_middleware::correlation))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
