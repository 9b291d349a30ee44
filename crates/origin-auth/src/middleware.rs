//! Request-admission middleware
//!
//! Four layers with declared ordering: authenticate → scope → rate limit →
//! IP allowlist. Public routes pass every layer untouched. The
//! authenticate layer resolves the API key and loads the tenant row once;
//! later layers read both from request extensions.

use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use serde_json::json;

use origin_db::{Database, DbTenant};
use origin_types::CorrelationId;

use crate::{
    api_key::{ApiKeyService, AuthenticatedKey},
    ip::{IpAllowlist, IpCheckConfig},
    rate_limit::{RateDecision, RateLimiter},
    scope::{is_public_route, required_scope},
};

/// Everything the admission stack needs, assembled at the composition root
#[derive(Clone)]
pub struct AuthContext {
    pub db: Database,
    pub api_keys: ApiKeyService,
    pub rate_limiter: RateLimiter,
    pub ip_config: IpCheckConfig,
}

/// Tenant row resolved during authentication
#[derive(Debug, Clone)]
pub struct TenantContext(pub DbTenant);

/// Authenticate the API key and load the tenant row.
pub async fn authenticate(
    State(ctx): State<Arc<AuthContext>>,
    mut req: Request,
    next: Next,
) -> Response {
    if is_public_route(req.uri().path()) {
        return next.run(req).await;
    }

    let raw_key = match req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
    {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => {
            return deny(
                &req,
                StatusCode::UNAUTHORIZED,
                "auth_error",
                "missing x-api-key header",
                None,
            )
        }
    };

    let key = match ctx.api_keys.authenticate(&raw_key).await {
        Ok(key) => key,
        Err(e) => {
            tracing::debug!(error = %e, "API key authentication failed");
            return deny(
                &req,
                StatusCode::UNAUTHORIZED,
                "auth_error",
                "invalid API key",
                None,
            );
        }
    };

    let tenant = match ctx.db.tenants().find_by_id(key.tenant_id).await {
        Ok(Some(tenant)) => tenant,
        Ok(None) => {
            tracing::error!(tenant_id = %key.tenant_id, "API key references missing tenant");
            return deny(
                &req,
                StatusCode::UNAUTHORIZED,
                "auth_error",
                "invalid API key",
                None,
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "tenant lookup failed");
            return deny(
                &req,
                StatusCode::SERVICE_UNAVAILABLE,
                "DATABASE_UNAVAILABLE",
                "database unavailable",
                Some(5),
            );
        }
    };

    req.extensions_mut().insert(key);
    req.extensions_mut().insert(TenantContext(tenant));
    next.run(req).await
}

/// Enforce the per-route required scope.
pub async fn enforce_scope(req: Request, next: Next) -> Response {
    let path = req.uri().path();
    let Some(required) = required_scope(req.method(), path) else {
        return next.run(req).await;
    };

    let authorized = req
        .extensions()
        .get::<AuthenticatedKey>()
        .map(|key| key.has_scope(required))
        .unwrap_or(false);

    if !authorized {
        return deny(
            &req,
            StatusCode::FORBIDDEN,
            "scope_denied",
            &format!("missing required scope: {required}"),
            None,
        );
    }
    next.run(req).await
}

/// Take one token from the tenant's bucket.
pub async fn enforce_rate_limit(
    State(ctx): State<Arc<AuthContext>>,
    req: Request,
    next: Next,
) -> Response {
    if is_public_route(req.uri().path()) {
        return next.run(req).await;
    }
    let Some(TenantContext(tenant)) = req.extensions().get::<TenantContext>().cloned() else {
        return next.run(req).await;
    };

    match ctx
        .rate_limiter
        .check(tenant.id, tenant.rate_limit_per_minute, tenant.rate_limit_burst)
        .await
    {
        Ok(RateDecision::Allowed) => next.run(req).await,
        Ok(RateDecision::Limited {
            retry_after_seconds,
        }) => {
            crate::rate_limit::RATE_LIMITED_TOTAL
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            deny(
                &req,
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "rate limit exceeded",
                Some(retry_after_seconds),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "rate limiter error, admitting request");
            next.run(req).await
        }
    }
}

/// Enforce the tenant's IP allowlist, when one is configured.
pub async fn enforce_ip_allowlist(
    State(ctx): State<Arc<AuthContext>>,
    req: Request,
    next: Next,
) -> Response {
    if is_public_route(req.uri().path()) {
        return next.run(req).await;
    }
    let Some(TenantContext(tenant)) = req.extensions().get::<TenantContext>().cloned() else {
        return next.run(req).await;
    };
    let Some(allowlist_json) = tenant.ip_allowlist.as_ref() else {
        return next.run(req).await;
    };

    let allowlist = IpAllowlist::parse(allowlist_json);
    let client_ip = client_ip(&req);

    let permitted = match client_ip {
        Some(ip) => allowlist.permits(ip, ctx.ip_config),
        // No derivable client address: only the explicit fail-open admits it.
        None => ctx.ip_config.fail_open,
    };

    if !permitted {
        return deny(
            &req,
            StatusCode::FORBIDDEN,
            "ip_denied",
            "client IP not in tenant allowlist",
            None,
        );
    }
    next.run(req).await
}

/// First X-Forwarded-For entry, falling back to the socket peer address.
fn client_ip(req: &Request) -> Option<IpAddr> {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return Some(ip);
            }
        }
    }
    req.extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip())
}

/// Uniform denial body: {error_code, message, correlation_id}.
fn deny(
    req: &Request,
    status: StatusCode,
    error_code: &str,
    message: &str,
    retry_after_seconds: Option<u64>,
) -> Response {
    let correlation_id = req
        .extensions()
        .get::<CorrelationId>()
        .map(|c| c.as_str().to_string())
        .unwrap_or_default();
    let body = json!({
        "error_code": error_code,
        "message": message,
        "correlation_id": correlation_id,
    });

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(seconds) = retry_after_seconds {
        builder = builder.header(header::RETRY_AFTER, seconds.to_string());
    }
    builder
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
