//! Per-route scope requirements
//!
//! The single source of truth for which scope each route demands. Public
//! routes bypass authentication and scope checks entirely.

use axum::http::Method;

use origin_types::Scope;

/// Routes that bypass auth, scope, rate-limit and IP checks
pub fn is_public_route(path: &str) -> bool {
    matches!(path, "/health" | "/ready" | "/metrics") || path.starts_with("/docs")
}

/// The scope a route requires, or None for public/unmatched routes.
/// Unmatched non-public routes 404 later in the router; requiring no scope
/// for them leaks nothing because no handler exists.
pub fn required_scope(method: &Method, path: &str) -> Option<Scope> {
    if is_public_route(path) {
        return None;
    }
    if path.starts_with("/admin/") || path == "/admin" {
        return Some(Scope::Admin);
    }
    if *method == Method::POST {
        return match path {
            "/v1/ingest" => Some(Scope::IngestWrite),
            "/v1/evidence-packs" => Some(Scope::EvidenceWrite),
            "/v1/webhooks" | "/v1/webhooks/test" => Some(Scope::WebhooksWrite),
            _ => None,
        };
    }
    if *method == Method::GET {
        if path.starts_with("/v1/evidence-packs/") {
            return Some(Scope::EvidenceRead);
        }
        if path.starts_with("/v1/certificates/")
            || path.starts_with("/v1/keys/")
            || path == "/v1/models/status"
        {
            return Some(Scope::CertificatesRead);
        }
        if path.starts_with("/v1/webhooks/") {
            return Some(Scope::WebhooksRead);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_routes() {
        assert!(is_public_route("/health"));
        assert!(is_public_route("/ready"));
        assert!(is_public_route("/metrics"));
        assert!(is_public_route("/docs/openapi.json"));
        assert!(!is_public_route("/v1/ingest"));
    }

    #[test]
    fn test_scope_table() {
        assert_eq!(
            required_scope(&Method::POST, "/v1/ingest"),
            Some(Scope::IngestWrite)
        );
        assert_eq!(
            required_scope(&Method::POST, "/v1/evidence-packs"),
            Some(Scope::EvidenceWrite)
        );
        assert_eq!(
            required_scope(&Method::GET, "/v1/evidence-packs/abc"),
            Some(Scope::EvidenceRead)
        );
        assert_eq!(
            required_scope(&Method::GET, "/v1/certificates/abc"),
            Some(Scope::CertificatesRead)
        );
        assert_eq!(
            required_scope(&Method::GET, "/v1/keys/jwks.json"),
            Some(Scope::CertificatesRead)
        );
        assert_eq!(
            required_scope(&Method::POST, "/v1/webhooks"),
            Some(Scope::WebhooksWrite)
        );
        assert_eq!(
            required_scope(&Method::POST, "/v1/webhooks/test"),
            Some(Scope::WebhooksWrite)
        );
        assert_eq!(
            required_scope(&Method::GET, "/v1/webhooks/abc/deliveries"),
            Some(Scope::WebhooksRead)
        );
        assert_eq!(
            required_scope(&Method::POST, "/admin/tenants"),
            Some(Scope::Admin)
        );
        assert_eq!(
            required_scope(&Method::GET, "/admin/ledger/t1/verify"),
            Some(Scope::Admin)
        );
    }

    #[test]
    fn test_public_routes_require_nothing() {
        assert_eq!(required_scope(&Method::GET, "/health"), None);
        assert_eq!(required_scope(&Method::GET, "/metrics"), None);
    }
}
