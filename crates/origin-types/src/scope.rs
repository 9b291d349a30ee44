//! API-key scopes
//!
//! Scopes gate every non-public route. An API key carries a set of scopes;
//! each route declares the single scope it requires.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Permission scope attached to an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "ingest:write")]
    IngestWrite,
    #[serde(rename = "evidence:write")]
    EvidenceWrite,
    #[serde(rename = "evidence:read")]
    EvidenceRead,
    #[serde(rename = "webhooks:write")]
    WebhooksWrite,
    #[serde(rename = "webhooks:read")]
    WebhooksRead,
    #[serde(rename = "certificates:read")]
    CertificatesRead,
    #[serde(rename = "admin")]
    Admin,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::IngestWrite => "ingest:write",
            Scope::EvidenceWrite => "evidence:write",
            Scope::EvidenceRead => "evidence:read",
            Scope::WebhooksWrite => "webhooks:write",
            Scope::WebhooksRead => "webhooks:read",
            Scope::CertificatesRead => "certificates:read",
            Scope::Admin => "admin",
        }
    }

    /// All scopes a freshly provisioned tenant key receives.
    pub fn tenant_default() -> Vec<Scope> {
        vec![
            Scope::IngestWrite,
            Scope::EvidenceWrite,
            Scope::EvidenceRead,
            Scope::WebhooksWrite,
            Scope::WebhooksRead,
            Scope::CertificatesRead,
        ]
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingest:write" => Ok(Scope::IngestWrite),
            "evidence:write" => Ok(Scope::EvidenceWrite),
            "evidence:read" => Ok(Scope::EvidenceRead),
            "webhooks:write" => Ok(Scope::WebhooksWrite),
            "webhooks:read" => Ok(Scope::WebhooksRead),
            "certificates:read" => Ok(Scope::CertificatesRead),
            "admin" => Ok(Scope::Admin),
            other => Err(format!("unknown scope: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        for scope in [
            Scope::IngestWrite,
            Scope::EvidenceWrite,
            Scope::EvidenceRead,
            Scope::WebhooksWrite,
            Scope::WebhooksRead,
            Scope::CertificatesRead,
            Scope::Admin,
        ] {
            assert_eq!(scope.as_str().parse::<Scope>().unwrap(), scope);
        }
    }

    #[test]
    fn test_default_set_excludes_admin() {
        assert!(!Scope::tenant_default().contains(&Scope::Admin));
    }
}
