//! ORIGIN Authentication Layer
//!
//! The request-admission stack, in declared order:
//! authentication → scope enforcement → rate limiting → IP allowlist.
//!
//! Features:
//! - API key lookup by indexed 8-character prefix, O(1) in key count
//! - HMAC-SHA256 digests with constant-time comparison; raw keys never stored
//! - Per-route required-scope table
//! - Redis token bucket whose keys expire after idle TTL
//! - Per-tenant CIDR/exact-IP allowlists, fail-closed outside development

pub mod api_key;
pub mod ip;
pub mod middleware;
pub mod rate_limit;
pub mod scope;

pub use api_key::{ApiKeyService, AuthenticatedKey, IssuedKey};
pub use ip::{IpAllowlist, IpCheckConfig};
pub use middleware::{AuthContext, TenantContext};
pub use rate_limit::{RateDecision, RateLimiter};
pub use scope::{is_public_route, required_scope};

use thiserror::Error;

use origin_db::DbError;

/// Authentication layer errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing API key")]
    MissingKey,

    #[error("Invalid API key")]
    InvalidKey,

    #[error("API key revoked")]
    RevokedKey,

    #[error("Missing required scope: {0}")]
    MissingScope(String),

    #[error("IP not allowed: {0}")]
    IpDenied(String),

    #[error("Rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type AuthResult<T> = Result<T, AuthError>;
