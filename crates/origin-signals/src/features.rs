//! Per-upload feature computation
//!
//! Each feature is a single aggregate query against persisted history. The
//! computed vector is persisted on the Upload row (`decision_inputs_json`)
//! so a decision can be replayed and explained later without recomputation.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use origin_db::Database;
use origin_types::Features;

use crate::Result;

/// Aggregates upload history into the feature vector
#[derive(Clone)]
pub struct FeatureService {
    db: Database,
}

impl FeatureService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Compute features for one submission.
    ///
    /// `account_id`/`device_id` are the already-resolved internal ids;
    /// `now` is the ingest timestamp so velocity windows are stable under
    /// replay.
    pub async fn compute(
        &self,
        tenant_id: Uuid,
        account_id: Uuid,
        account_created_at: DateTime<Utc>,
        device_id: Option<Uuid>,
        pvid: &str,
        now: DateTime<Utc>,
    ) -> Result<Features> {
        let uploads = self.db.uploads();
        let window_start = now - Duration::hours(24);

        let account_age_days = (now - account_created_at).num_days().max(0);

        let upload_velocity_24h = uploads
            .count_by_account_since(account_id, window_start)
            .await?;

        let device_velocity_24h = match device_id {
            Some(device_id) => uploads.count_by_device_since(device_id, window_start).await?,
            None => 0,
        };

        let prior_quarantine_count = uploads
            .count_prior_decisions(tenant_id, account_id, pvid, "QUARANTINE")
            .await?;
        let prior_reject_count = uploads
            .count_prior_decisions(tenant_id, account_id, pvid, "REJECT")
            .await?;

        Ok(Features {
            account_age_days,
            upload_velocity_24h,
            device_velocity_24h,
            prior_quarantine_count,
            prior_reject_count,
        })
    }
}
