//! Tenant repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbResult, DbTenant};

pub struct TenantRepo {
    pool: PgPool,
}

impl TenantRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        display_name: &str,
        ip_allowlist: Option<serde_json::Value>,
        rate_limit_per_minute: i32,
        rate_limit_burst: i32,
        policy_profile_id: &str,
        policy_profile_version: i32,
    ) -> DbResult<DbTenant> {
        let tenant = sqlx::query_as::<_, DbTenant>(
            r#"
            INSERT INTO tenants (id, display_name, ip_allowlist, rate_limit_per_minute,
                                 rate_limit_burst, policy_profile_id, policy_profile_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(display_name)
        .bind(ip_allowlist)
        .bind(rate_limit_per_minute)
        .bind(rate_limit_burst)
        .bind(policy_profile_id)
        .bind(policy_profile_version)
        .fetch_one(&self.pool)
        .await?;
        Ok(tenant)
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<Option<DbTenant>> {
        let tenant = sqlx::query_as::<_, DbTenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }
}
