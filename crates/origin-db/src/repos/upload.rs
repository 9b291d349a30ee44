//! Upload repository
//!
//! Inserts run inside the ingest transaction; aggregate queries feed the
//! feature service and run against the pool.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{DbResult, DbRiskSignals, DbUpload};

pub struct UploadRepo {
    pool: PgPool,
}

impl UploadRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        tenant_id: Uuid,
        external_id: &str,
        account_id: Uuid,
        device_id: Option<Uuid>,
        pvid: &str,
        received_at: DateTime<Utc>,
        metadata: &serde_json::Value,
        decision_inputs_json: &serde_json::Value,
        decision: &str,
        decision_reasons: &serde_json::Value,
    ) -> DbResult<DbUpload> {
        let upload = sqlx::query_as::<_, DbUpload>(
            r#"
            INSERT INTO uploads (id, tenant_id, external_id, account_id, device_id, pvid,
                                 received_at, metadata, decision_inputs_json, decision,
                                 decision_reasons)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(external_id)
        .bind(account_id)
        .bind(device_id)
        .bind(pvid)
        .bind(received_at)
        .bind(metadata)
        .bind(decision_inputs_json)
        .bind(decision)
        .bind(decision_reasons)
        .fetch_one(&mut **tx)
        .await?;
        Ok(upload)
    }

    /// Backfill certificate and ledger references once both rows exist.
    pub async fn link_decision_tx(
        tx: &mut Transaction<'_, Postgres>,
        upload_id: Uuid,
        certificate_id: Uuid,
        ledger_event_id: i64,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE uploads SET certificate_id = $1, ledger_event_id = $2 WHERE id = $3",
        )
        .bind(certificate_id)
        .bind(ledger_event_id)
        .bind(upload_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn insert_signals_tx(
        tx: &mut Transaction<'_, Postgres>,
        upload_id: Uuid,
        risk: f64,
        assurance: f64,
        anomaly: f64,
        synthetic_likelihood: f64,
        risk_model_version: &str,
        anomaly_model_version: &str,
        computed_at: DateTime<Utc>,
    ) -> DbResult<DbRiskSignals> {
        let signals = sqlx::query_as::<_, DbRiskSignals>(
            r#"
            INSERT INTO risk_signals (id, upload_id, risk, assurance, anomaly,
                                      synthetic_likelihood, risk_model_version,
                                      anomaly_model_version, computed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(upload_id)
        .bind(risk)
        .bind(assurance)
        .bind(anomaly)
        .bind(synthetic_likelihood)
        .bind(risk_model_version)
        .bind(anomaly_model_version)
        .bind(computed_at)
        .fetch_one(&mut **tx)
        .await?;
        Ok(signals)
    }

    pub async fn find_signals(&self, upload_id: Uuid) -> DbResult<Option<DbRiskSignals>> {
        let signals = sqlx::query_as::<_, DbRiskSignals>(
            "SELECT * FROM risk_signals WHERE upload_id = $1",
        )
        .bind(upload_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(signals)
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<Option<DbUpload>> {
        let upload = sqlx::query_as::<_, DbUpload>("SELECT * FROM uploads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(upload)
    }

    // =========================================================================
    // Feature aggregates
    // =========================================================================

    pub async fn account_created_at(
        &self,
        tenant_id: Uuid,
        account_id: Uuid,
    ) -> DbResult<Option<DateTime<Utc>>> {
        let created = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT created_at FROM accounts WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(created)
    }

    pub async fn count_by_account_since(
        &self,
        account_id: Uuid,
        since: DateTime<Utc>,
    ) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM uploads WHERE account_id = $1 AND received_at >= $2",
        )
        .bind(account_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn count_by_device_since(
        &self,
        device_id: Uuid,
        since: DateTime<Utc>,
    ) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM uploads WHERE device_id = $1 AND received_at >= $2",
        )
        .bind(device_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Prior decisions of one kind attributable to the account or the PVID.
    pub async fn count_prior_decisions(
        &self,
        tenant_id: Uuid,
        account_id: Uuid,
        pvid: &str,
        decision: &str,
    ) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM uploads
            WHERE tenant_id = $1 AND decision = $2 AND (account_id = $3 OR pvid = $4)
            "#,
        )
        .bind(tenant_id)
        .bind(decision)
        .bind(account_id)
        .bind(pvid)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
