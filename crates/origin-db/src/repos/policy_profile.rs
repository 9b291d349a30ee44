//! Policy profile repository

use sqlx::PgPool;

use crate::{DbPolicyProfile, DbResult};

pub struct PolicyProfileRepo {
    pool: PgPool,
}

impl PolicyProfileRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: &str, version: i32) -> DbResult<Option<DbPolicyProfile>> {
        let profile = sqlx::query_as::<_, DbPolicyProfile>(
            "SELECT * FROM policy_profiles WHERE id = $1 AND version = $2",
        )
        .bind(id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    pub async fn insert(
        &self,
        id: &str,
        version: i32,
        rules: serde_json::Value,
        risk_model_version: &str,
        anomaly_model_version: &str,
    ) -> DbResult<DbPolicyProfile> {
        let profile = sqlx::query_as::<_, DbPolicyProfile>(
            r#"
            INSERT INTO policy_profiles (id, version, rules, risk_model_version, anomaly_model_version)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(version)
        .bind(rules)
        .bind(risk_model_version)
        .bind(anomaly_model_version)
        .fetch_one(&self.pool)
        .await?;
        Ok(profile)
    }
}
