//! API key authentication
//!
//! Keys look like `org_<48 hex chars>`. Storage keeps only the first 8
//! characters (the indexed prefix) and an HMAC-SHA256 digest under the
//! server secret; the raw key exists once, in the provisioning response.
//! Lookup selects candidates by prefix and compares digests in constant
//! time. A bcrypt path remains for keys imported from the legacy scheme,
//! behind an explicit fallback flag.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use origin_db::{Database, DbApiKey};
use origin_types::Scope;

use crate::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

const KEY_BYTES: usize = 24;
const PREFIX_LEN: usize = 8;

/// API key service
#[derive(Clone)]
pub struct ApiKeyService {
    db: Database,
    server_secret: String,
    legacy_fallback: bool,
}

/// A freshly issued key; the raw value is returned exactly once
#[derive(Debug, Clone)]
pub struct IssuedKey {
    pub id: Uuid,
    pub raw_key: String,
    pub prefix: String,
}

/// The resolved identity attached to an authenticated request
#[derive(Debug, Clone)]
pub struct AuthenticatedKey {
    pub api_key_id: Uuid,
    pub tenant_id: Uuid,
    pub scopes: Vec<Scope>,
}

impl AuthenticatedKey {
    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }
}

impl ApiKeyService {
    pub fn new(db: Database, server_secret: String, legacy_fallback: bool) -> Self {
        Self {
            db,
            server_secret,
            legacy_fallback,
        }
    }

    /// Generate and persist a key for a tenant.
    pub async fn issue(&self, tenant_id: Uuid, scopes: &[Scope]) -> AuthResult<IssuedKey> {
        let mut bytes = [0u8; KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let raw_key = format!("org_{}", hex::encode(bytes));
        let prefix = &raw_key[..PREFIX_LEN];
        let digest = self.digest(&raw_key);

        let scopes_json = serde_json::to_value(
            scopes.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        )
        .unwrap_or_default();

        let record = self
            .db
            .api_keys()
            .insert(tenant_id, prefix, &digest, scopes_json)
            .await?;

        let prefix = prefix.to_string();
        Ok(IssuedKey {
            id: record.id,
            raw_key,
            prefix,
        })
    }

    /// Revoke a tenant's active keys and issue a replacement.
    pub async fn rotate(&self, tenant_id: Uuid, scopes: &[Scope]) -> AuthResult<IssuedKey> {
        let revoked = self.db.api_keys().revoke_all_for_tenant(tenant_id).await?;
        tracing::info!(tenant_id = %tenant_id, revoked, "rotated API keys");
        self.issue(tenant_id, scopes).await
    }

    /// Resolve a raw key to its tenant and scopes.
    pub async fn authenticate(&self, raw_key: &str) -> AuthResult<AuthenticatedKey> {
        if raw_key.len() < PREFIX_LEN {
            return Err(AuthError::InvalidKey);
        }
        let prefix = &raw_key[..PREFIX_LEN];
        let candidates = self.db.api_keys().find_by_prefix(prefix).await?;

        let digest = self.digest(raw_key);
        for candidate in candidates {
            if self.matches(&candidate, raw_key, &digest) {
                self.touch_last_used(candidate.id);
                return Ok(AuthenticatedKey {
                    api_key_id: candidate.id,
                    tenant_id: candidate.tenant_id,
                    scopes: parse_scopes(&candidate.scopes),
                });
            }
        }
        Err(AuthError::InvalidKey)
    }

    fn matches(&self, candidate: &DbApiKey, raw_key: &str, digest: &str) -> bool {
        let hmac_match: bool = digest
            .as_bytes()
            .ct_eq(candidate.digest.as_bytes())
            .into();
        if hmac_match {
            return true;
        }
        // Legacy digests start with the bcrypt version marker.
        if self.legacy_fallback && candidate.digest.starts_with("$2") {
            return bcrypt::verify(raw_key, &candidate.digest).unwrap_or(false);
        }
        false
    }

    /// HMAC-SHA256(server_secret, raw_key), hex
    pub fn digest(&self, raw_key: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.server_secret.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(raw_key.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// last_used_at is advisory; update off the request path.
    fn touch_last_used(&self, id: Uuid) {
        let repo = self.db.api_keys();
        tokio::spawn(async move {
            if let Err(e) = repo.touch_last_used(id).await {
                tracing::warn!(api_key_id = %id, error = %e, "failed to update last_used_at");
            }
        });
    }
}

fn parse_scopes(value: &serde_json::Value) -> Vec<Scope> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|s| s.as_str())
                .filter_map(|s| s.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scopes() {
        let value = serde_json::json!(["ingest:write", "evidence:read", "bogus"]);
        let scopes = parse_scopes(&value);
        assert_eq!(scopes, vec![Scope::IngestWrite, Scope::EvidenceRead]);
    }

    #[test]
    fn test_authenticated_key_scope_check() {
        let key = AuthenticatedKey {
            api_key_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            scopes: vec![Scope::EvidenceRead],
        };
        assert!(key.has_scope(Scope::EvidenceRead));
        assert!(!key.has_scope(Scope::IngestWrite));
    }
}
