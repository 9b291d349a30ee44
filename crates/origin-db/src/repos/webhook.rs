//! Webhook and delivery repository

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbResult, DbWebhook, DbWebhookDelivery};

pub struct WebhookRepo {
    pool: PgPool,
}

impl WebhookRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        tenant_id: Uuid,
        url: &str,
        events: serde_json::Value,
        encrypted_secret: &[u8],
    ) -> DbResult<DbWebhook> {
        let webhook = sqlx::query_as::<_, DbWebhook>(
            r#"
            INSERT INTO webhooks (id, tenant_id, url, events, encrypted_secret, active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(url)
        .bind(events)
        .bind(encrypted_secret)
        .fetch_one(&self.pool)
        .await?;
        Ok(webhook)
    }

    pub async fn find_for_tenant(&self, tenant_id: Uuid, id: Uuid) -> DbResult<Option<DbWebhook>> {
        let webhook = sqlx::query_as::<_, DbWebhook>(
            "SELECT * FROM webhooks WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(webhook)
    }

    /// Active endpoints subscribed to an event type for a tenant.
    pub async fn find_subscribed(
        &self,
        tenant_id: Uuid,
        event_type: &str,
    ) -> DbResult<Vec<DbWebhook>> {
        let webhooks = sqlx::query_as::<_, DbWebhook>(
            r#"
            SELECT * FROM webhooks
            WHERE tenant_id = $1 AND active AND events ? $2
            "#,
        )
        .bind(tenant_id)
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(webhooks)
    }

    // =========================================================================
    // Deliveries
    // =========================================================================

    /// One row per attempt; the history of a delivery is the set of rows
    /// sharing (webhook_id, event_id).
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_delivery(
        &self,
        webhook_id: Uuid,
        event_id: Uuid,
        event_type: &str,
        attempt: i32,
        status: &str,
        response_code: Option<i32>,
        correlation_id: &str,
        scheduled_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> DbResult<DbWebhookDelivery> {
        let delivery = sqlx::query_as::<_, DbWebhookDelivery>(
            r#"
            INSERT INTO webhook_deliveries (id, webhook_id, event_id, event_type, attempt,
                                            status, response_code, correlation_id,
                                            scheduled_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(webhook_id)
        .bind(event_id)
        .bind(event_type)
        .bind(attempt)
        .bind(status)
        .bind(response_code)
        .bind(correlation_id)
        .bind(scheduled_at)
        .bind(completed_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(delivery)
    }

    pub async fn list_deliveries(
        &self,
        webhook_id: Uuid,
        limit: i64,
    ) -> DbResult<Vec<DbWebhookDelivery>> {
        let deliveries = sqlx::query_as::<_, DbWebhookDelivery>(
            r#"
            SELECT * FROM webhook_deliveries
            WHERE webhook_id = $1
            ORDER BY scheduled_at DESC, attempt DESC
            LIMIT $2
            "#,
        )
        .bind(webhook_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(deliveries)
    }
}
