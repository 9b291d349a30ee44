//! Identity types for ORIGIN
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Convert to prefixed string
            pub fn to_prefixed_string(&self) -> String {
                format!("{}_{}", $prefix, self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

define_id_type!(TenantId, "tnt", "Identifier of a tenant (customer platform)");
define_id_type!(UploadId, "upl", "Identifier of a governed upload");
define_id_type!(CertificateId, "cert", "Identifier of a Decision Certificate");
define_id_type!(AccountId, "acct", "Identifier of a submitting account");
define_id_type!(DeviceId, "dev", "Identifier of a submitting device");
define_id_type!(WebhookId, "whk", "Identifier of a webhook endpoint");
define_id_type!(EventId, "evt", "Identifier of an emitted webhook event");
define_id_type!(ApiKeyId, "key", "Identifier of an API key");

/// Provenance identifier, derived deterministically from submission
/// attributes. Unlike the UUID ids above it is a content-derived hex digest,
/// so two submissions with identical provenance share a PVID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pvid(pub String);

impl Pvid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pvid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pvid_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_roundtrip() {
        let id = CertificateId::new();
        let s = id.to_prefixed_string();
        assert!(s.starts_with("cert_"));
        assert_eq!(CertificateId::parse(&s).unwrap(), id);
    }

    #[test]
    fn test_parse_accepts_bare_uuid() {
        let id = TenantId::new();
        assert_eq!(TenantId::parse(&id.0.to_string()).unwrap(), id);
    }
}
