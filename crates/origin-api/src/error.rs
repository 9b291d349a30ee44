//! API error handling
//!
//! Every error leaves the service as `{error_code, message, correlation_id}`
//! with the status class fixed by the taxonomy: validation 400, auth 401,
//! forbidden 403, not-found 404, conflict 409, rate-limit 429 (Retry-After),
//! transient infrastructure 503 (Retry-After), everything unexpected 500.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use origin_evidence::EvidenceError;
use origin_types::{CorrelationId, OriginError};

/// Wire shape of every error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error_code: String,
    pub message: String,
    pub correlation_id: String,
}

/// A taxonomy error bound to its request's correlation id
#[derive(Debug)]
pub struct ApiError {
    pub inner: OriginError,
    pub correlation_id: String,
}

impl ApiError {
    pub fn new(inner: OriginError, correlation_id: &CorrelationId) -> Self {
        Self {
            inner,
            correlation_id: correlation_id.as_str().to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.inner {
            OriginError::Validation { .. } => StatusCode::BAD_REQUEST,
            OriginError::Auth { .. } => StatusCode::UNAUTHORIZED,
            OriginError::Forbidden { .. } => StatusCode::FORBIDDEN,
            OriginError::NotFound { .. } => StatusCode::NOT_FOUND,
            OriginError::Conflict { .. } => StatusCode::CONFLICT,
            OriginError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            OriginError::TransientInfra { .. } => StatusCode::SERVICE_UNAVAILABLE,
            OriginError::Integrity { .. } | OriginError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn retry_after_seconds(&self) -> Option<u64> {
        match &self.inner {
            OriginError::RateLimited {
                retry_after_seconds,
            }
            | OriginError::TransientInfra {
                retry_after_seconds,
                ..
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(
                error = %self.inner,
                correlation_id = %self.correlation_id,
                "request failed"
            );
        }
        let retry_after_seconds = self.retry_after_seconds();
        let body = ErrorBody {
            error_code: self.inner.error_code().to_string(),
            message: self.inner.client_message(),
            correlation_id: self.correlation_id,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after_seconds {
            if let Ok(value) = seconds.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Map evidence pipeline errors into the taxonomy.
pub fn from_evidence(e: EvidenceError, correlation_id: &CorrelationId) -> ApiError {
    let inner = match e {
        EvidenceError::BrokerUnavailable(reason) => OriginError::broker_unavailable(reason),
        EvidenceError::CertificateNotFound => OriginError::not_found("certificate"),
        EvidenceError::UnknownFormat(format) => {
            OriginError::validation("format", format!("unknown format: {format}"))
        }
        EvidenceError::BlobUnavailable(reason) => OriginError::TransientInfra {
            service: origin_types::TransientService::BlobStore,
            reason,
            retry_after_seconds: 30,
        },
        other => OriginError::internal(other.to_string()),
    };
    ApiError::new(inner, correlation_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correlation() -> CorrelationId {
        CorrelationId("req-test".to_string())
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (OriginError::validation("f", "bad"), StatusCode::BAD_REQUEST),
            (OriginError::auth("nope"), StatusCode::UNAUTHORIZED),
            (OriginError::scope_denied("x"), StatusCode::FORBIDDEN),
            (OriginError::not_found("certificate"), StatusCode::NOT_FOUND),
            (
                OriginError::broker_unavailable("down"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (inner, expected) in cases {
            assert_eq!(ApiError::new(inner, &correlation()).status(), expected);
        }
    }

    #[test]
    fn test_broker_error_carries_retry_after() {
        let err = ApiError::new(OriginError::broker_unavailable("down"), &correlation());
        assert_eq!(err.retry_after_seconds(), Some(30));
    }
}
