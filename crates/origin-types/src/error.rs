//! Error taxonomy for ORIGIN
//!
//! One enum spans the whole service so that every surface maps errors the
//! same way: a stable `error_code`, an HTTP-ish class, and a short message.
//! Transient errors are recoverable and never mutate state into a terminal
//! failure; deterministic failures persist a terminal record instead.

use thiserror::Error;

/// Result type for ORIGIN operations
pub type Result<T> = std::result::Result<T, OriginError>;

/// ORIGIN error taxonomy
#[derive(Debug, Clone, Error)]
pub enum OriginError {
    /// Malformed or semantically invalid request input
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Missing or unverifiable API key
    #[error("Authentication failed: {reason}")]
    Auth { reason: String },

    /// Authenticated but not permitted (scope, IP, tenant mismatch)
    #[error("Forbidden: {reason}")]
    Forbidden { code: ForbiddenCode, reason: String },

    /// Referenced resource does not exist for this tenant
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Idempotency key reused with a different request body
    #[error("Idempotency conflict: {reason}")]
    Conflict { reason: String },

    /// Token bucket exhausted
    #[error("Rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    /// A dependency (broker, cache, blob store, KMS) is unavailable
    #[error("{service} unavailable: {reason}")]
    TransientInfra {
        service: TransientService,
        reason: String,
        retry_after_seconds: u64,
    },

    /// Ledger chain verification failed; never swallowed
    #[error("Ledger integrity violation: {detail}")]
    Integrity { detail: String },

    /// Deterministic, unexpected failure
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Which dependency a transient failure names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientService {
    Broker,
    Cache,
    BlobStore,
    Kms,
    Database,
}

impl TransientService {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransientService::Broker => "broker",
            TransientService::Cache => "cache",
            TransientService::BlobStore => "blob store",
            TransientService::Kms => "KMS",
            TransientService::Database => "database",
        }
    }
}

impl std::fmt::Display for TransientService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refinement of 403 responses so clients can distinguish denial causes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenCode {
    ScopeDenied,
    IpDenied,
    TenantMismatch,
}

impl OriginError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    pub fn scope_denied(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            code: ForbiddenCode::ScopeDenied,
            reason: reason.into(),
        }
    }

    pub fn ip_denied(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            code: ForbiddenCode::IpDenied,
            reason: reason.into(),
        }
    }

    pub fn tenant_mismatch(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            code: ForbiddenCode::TenantMismatch,
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn broker_unavailable(reason: impl Into<String>) -> Self {
        Self::TransientInfra {
            service: TransientService::Broker,
            reason: reason.into(),
            retry_after_seconds: 30,
        }
    }

    /// Whether a client retry of the same request can succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::TransientInfra { .. }
        )
    }

    /// Stable machine-readable code for API responses and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Auth { .. } => "auth_error",
            Self::Forbidden { code, .. } => match code {
                ForbiddenCode::ScopeDenied => "scope_denied",
                ForbiddenCode::IpDenied => "ip_denied",
                ForbiddenCode::TenantMismatch => "tenant_mismatch",
            },
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "idempotency_conflict",
            Self::RateLimited { .. } => "rate_limited",
            Self::TransientInfra { service, .. } => match service {
                TransientService::Broker => "BROKER_UNAVAILABLE",
                TransientService::Cache => "CACHE_UNAVAILABLE",
                TransientService::BlobStore => "BLOB_STORE_UNAVAILABLE",
                TransientService::Kms => "KMS_UNAVAILABLE",
                TransientService::Database => "DATABASE_UNAVAILABLE",
            },
            Self::Integrity { .. } => "ledger_integrity_violation",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Short message for clients, capped at 200 bytes. Truncation backs up
    /// to a char boundary so multibyte input cannot split a character.
    pub fn client_message(&self) -> String {
        let mut msg = self.to_string();
        if msg.len() > 200 {
            let mut end = 197;
            while !msg.is_char_boundary(end) {
                end -= 1;
            }
            msg.truncate(end);
            msg.push_str("...");
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            OriginError::scope_denied("missing ingest:write").error_code(),
            "scope_denied"
        );
        assert_eq!(
            OriginError::broker_unavailable("connection refused").error_code(),
            "BROKER_UNAVAILABLE"
        );
    }

    #[test]
    fn test_retriable_errors() {
        assert!(OriginError::broker_unavailable("down").is_retriable());
        assert!(!OriginError::not_found("certificate").is_retriable());
    }

    #[test]
    fn test_client_message_is_capped() {
        let err = OriginError::internal("x".repeat(500));
        assert_eq!(err.client_message().len(), 200);
    }

    #[test]
    fn test_client_message_truncates_on_char_boundary() {
        // Multibyte content sized so the cap lands mid-character.
        let err = OriginError::validation("format", "é".repeat(300));
        let msg = err.client_message();
        assert!(msg.len() <= 200);
        assert!(msg.ends_with("..."));
        assert!(msg.is_char_boundary(msg.len() - 3));
    }
}
