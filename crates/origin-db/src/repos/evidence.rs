//! Evidence pack repository
//!
//! State transitions are monotone: `ready` and `failed` are terminal for a
//! given task id; only an explicit requeue (fresh suffixed task id) makes a
//! failed row eligible again. Updates therefore guard on the current status.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbEvidencePack, DbResult};

pub struct EvidenceRepo {
    pool: PgPool,
}

impl EvidenceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_certificate(
        &self,
        certificate_id: Uuid,
    ) -> DbResult<Option<DbEvidencePack>> {
        let pack = sqlx::query_as::<_, DbEvidencePack>(
            "SELECT * FROM evidence_packs WHERE certificate_id = $1",
        )
        .bind(certificate_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(pack)
    }

    pub async fn insert_pending(
        &self,
        certificate_id: Uuid,
        tenant_id: Uuid,
        formats_requested: serde_json::Value,
        task_id: &str,
    ) -> DbResult<DbEvidencePack> {
        let pack = sqlx::query_as::<_, DbEvidencePack>(
            r#"
            INSERT INTO evidence_packs (certificate_id, tenant_id, status, formats_requested,
                                        storage_keys, artifact_hashes, artifact_sizes, task_id)
            VALUES ($1, $2, 'pending', $3, '{}'::jsonb, '{}'::jsonb, '{}'::jsonb, $4)
            RETURNING *
            "#,
        )
        .bind(certificate_id)
        .bind(tenant_id)
        .bind(formats_requested)
        .bind(task_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(pack)
    }

    /// Record what the request handler observed about the broker task.
    pub async fn record_observation(
        &self,
        certificate_id: Uuid,
        task_status: Option<&str>,
        pipeline_event: &str,
        error_code: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE evidence_packs
            SET task_status = $2, pipeline_event = $3, error_code = $4, updated_at = NOW()
            WHERE certificate_id = $1
            "#,
        )
        .bind(certificate_id)
        .bind(task_status)
        .bind(pipeline_event)
        .bind(error_code)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace the task id after a stuck requeue.
    pub async fn requeue(&self, certificate_id: Uuid, task_id: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE evidence_packs
            SET task_id = $2, status = 'pending', task_status = 'PENDING',
                pipeline_event = 'STUCK_REQUEUED', error_code = NULL, updated_at = NOW()
            WHERE certificate_id = $1
            "#,
        )
        .bind(certificate_id)
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Worker success; only a pending row may become ready.
    pub async fn mark_ready(
        &self,
        certificate_id: Uuid,
        storage_keys: serde_json::Value,
        artifact_hashes: serde_json::Value,
        artifact_sizes: serde_json::Value,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE evidence_packs
            SET status = 'ready', storage_keys = $2, artifact_hashes = $3, artifact_sizes = $4,
                task_status = 'SUCCESS', pipeline_event = 'UPDATED_FROM_TASK_RESULT',
                error_code = NULL, updated_at = NOW()
            WHERE certificate_id = $1 AND status = 'pending'
            "#,
        )
        .bind(certificate_id)
        .bind(storage_keys)
        .bind(artifact_hashes)
        .bind(artifact_sizes)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Deterministic worker failure; broker trouble never lands here.
    pub async fn mark_failed(&self, certificate_id: Uuid, error_code: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE evidence_packs
            SET status = 'failed', task_status = 'FAILURE',
                pipeline_event = 'UPDATED_FROM_TASK_RESULT', error_code = $2, updated_at = NOW()
            WHERE certificate_id = $1 AND status = 'pending'
            "#,
        )
        .bind(certificate_id)
        .bind(error_code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Pending rows older than the stuck threshold, for requeue sweeps.
    pub async fn find_stuck(&self, older_than: DateTime<Utc>) -> DbResult<Vec<DbEvidencePack>> {
        let packs = sqlx::query_as::<_, DbEvidencePack>(
            "SELECT * FROM evidence_packs WHERE status = 'pending' AND updated_at < $1",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;
        Ok(packs)
    }
}
