//! Account and device repository
//!
//! Upserts return the existing row when the external id was already seen,
//! so callers always get the stable internal id and original created_at.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbAccount, DbDevice, DbResult};

pub struct IdentityRepo {
    pool: PgPool,
}

impl IdentityRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert_account(&self, tenant_id: Uuid, external_id: &str) -> DbResult<DbAccount> {
        let account = sqlx::query_as::<_, DbAccount>(
            r#"
            INSERT INTO accounts (id, tenant_id, external_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, external_id)
            DO UPDATE SET external_id = EXCLUDED.external_id
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(external_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }

    pub async fn upsert_device(&self, tenant_id: Uuid, external_id: &str) -> DbResult<DbDevice> {
        let device = sqlx::query_as::<_, DbDevice>(
            r#"
            INSERT INTO devices (id, tenant_id, external_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, external_id)
            DO UPDATE SET external_id = EXCLUDED.external_id
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(external_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(device)
    }
}
