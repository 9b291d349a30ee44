//! Correlation ids
//!
//! One correlation id accompanies a request through the middleware stack,
//! into ledger payload logging, webhook headers and evidence jobs. It is
//! accepted from the `x-correlation-id` header or generated on entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlation id propagated across request and task boundaries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a client-supplied id if it is plausible, otherwise generate.
    /// Anything longer than 128 chars or containing control characters is
    /// discarded rather than propagated into logs and headers.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() && v.len() <= 128 && v.chars().all(|c| !c.is_control()) => {
                Self(v.to_string())
            }
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_client_supplied() {
        let id = CorrelationId::from_header(Some("req-1234"));
        assert_eq!(id.as_str(), "req-1234");
    }

    #[test]
    fn test_rejects_oversized() {
        let long = "x".repeat(200);
        let id = CorrelationId::from_header(Some(&long));
        assert_ne!(id.as_str(), long);
    }

    #[test]
    fn test_rejects_control_chars() {
        let id = CorrelationId::from_header(Some("bad\nvalue"));
        assert_ne!(id.as_str(), "bad\nvalue");
    }
}
