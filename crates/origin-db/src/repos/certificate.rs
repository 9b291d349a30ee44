//! Certificate repository

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{DbCertificate, DbResult};

pub struct CertificateRepo {
    pool: PgPool,
}

impl CertificateRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        tenant_id: Uuid,
        upload_id: Uuid,
        policy_version: &str,
        inputs_hash: &str,
        outputs_hash: &str,
        ledger_hash: &str,
        key_id: &str,
        alg: &str,
        signature: &str,
        issued_at: DateTime<Utc>,
    ) -> DbResult<DbCertificate> {
        let certificate = sqlx::query_as::<_, DbCertificate>(
            r#"
            INSERT INTO certificates (id, tenant_id, upload_id, policy_version, inputs_hash,
                                      outputs_hash, ledger_hash, key_id, alg, signature,
                                      signature_encoding, issued_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'base64url', $11)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(upload_id)
        .bind(policy_version)
        .bind(inputs_hash)
        .bind(outputs_hash)
        .bind(ledger_hash)
        .bind(key_id)
        .bind(alg)
        .bind(signature)
        .bind(issued_at)
        .fetch_one(&mut **tx)
        .await?;
        Ok(certificate)
    }

    pub async fn find_for_tenant(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> DbResult<Option<DbCertificate>> {
        let certificate = sqlx::query_as::<_, DbCertificate>(
            "SELECT * FROM certificates WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(certificate)
    }
}
