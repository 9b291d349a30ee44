//! API key repository
//!
//! Lookup is by the indexed 8-character prefix; the caller compares HMAC
//! digests in constant time. The raw key is never stored.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbApiKey, DbResult};

pub struct ApiKeyRepo {
    pool: PgPool,
}

impl ApiKeyRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        tenant_id: Uuid,
        prefix: &str,
        digest: &str,
        scopes: serde_json::Value,
    ) -> DbResult<DbApiKey> {
        let key = sqlx::query_as::<_, DbApiKey>(
            r#"
            INSERT INTO api_keys (id, tenant_id, prefix, digest, scopes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(prefix)
        .bind(digest)
        .bind(scopes)
        .fetch_one(&self.pool)
        .await?;
        Ok(key)
    }

    /// Total keys ever issued; zero means a fresh installation.
    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM api_keys")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// All non-revoked candidates for a prefix; normally zero or one.
    pub async fn find_by_prefix(&self, prefix: &str) -> DbResult<Vec<DbApiKey>> {
        let keys = sqlx::query_as::<_, DbApiKey>(
            "SELECT * FROM api_keys WHERE prefix = $1 AND revoked_at IS NULL",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    /// Fired from a spawned task after successful auth; failures only log.
    pub async fn touch_last_used(&self, id: Uuid) -> DbResult<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Revoke every active key for a tenant (rotation inserts a fresh one).
    pub async fn revoke_all_for_tenant(&self, tenant_id: Uuid) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE api_keys SET revoked_at = $1 WHERE tenant_id = $2 AND revoked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
