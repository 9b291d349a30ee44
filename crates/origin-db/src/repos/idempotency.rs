//! Idempotency record repository
//!
//! First-class table, not an in-process cache. The primary key on
//! `(tenant_id, idempotency_key)` gives single-writer semantics: the
//! first committing request wins and later ones replay its stored bytes.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{DbIdempotencyRecord, DbResult};

pub struct IdempotencyRepo {
    pool: PgPool,
}

impl IdempotencyRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        tenant_id: Uuid,
        idempotency_key: &str,
    ) -> DbResult<Option<DbIdempotencyRecord>> {
        let record = sqlx::query_as::<_, DbIdempotencyRecord>(
            "SELECT * FROM idempotency_records WHERE tenant_id = $1 AND idempotency_key = $2",
        )
        .bind(tenant_id)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        idempotency_key: &str,
        request_hash: &str,
        response_body: &[u8],
        status_code: i32,
    ) -> DbResult<DbIdempotencyRecord> {
        let record = sqlx::query_as::<_, DbIdempotencyRecord>(
            r#"
            INSERT INTO idempotency_records (tenant_id, idempotency_key, request_hash,
                                             response_body, status_code)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(idempotency_key)
        .bind(request_hash)
        .bind(response_body)
        .bind(status_code)
        .fetch_one(&mut **tx)
        .await?;
        Ok(record)
    }
}
