//! Redis-backed task broker
//!
//! Jobs travel over a Redis list; task status lives in TTL'd status keys
//! keyed by task id. Connection and timeout failures surface as
//! `BrokerUnavailable` so callers can 503 with Retry-After instead of
//! recording a terminal failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use origin_db::cache::{keys, ttl};
use origin_db::CacheManager;
use origin_types::TaskStatus;

use crate::{EvidenceError, Result};

/// One unit of evidence-generation work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceJob {
    pub task_id: String,
    pub tenant_id: Uuid,
    pub certificate_id: Uuid,
    pub formats: Vec<String>,
    pub correlation_id: String,
}

/// Enqueue/consume/status operations against the broker
#[derive(Clone)]
pub struct TaskBroker {
    cache: CacheManager,
}

impl TaskBroker {
    pub fn new(cache: CacheManager) -> Self {
        Self { cache }
    }

    /// Enqueue a job and mark its task PENDING.
    pub async fn enqueue(&self, job: &EvidenceJob) -> Result<()> {
        let payload = serde_json::to_string(job)
            .map_err(|e| EvidenceError::Render(format!("job encoding: {e}")))?;
        self.set_status(&job.task_id, TaskStatus::Pending).await?;
        self.cache
            .queue_push(keys::TASK_QUEUE, &payload)
            .await
            .map_err(broker_err)?;
        Ok(())
    }

    /// Blocking pop for workers; None on timeout.
    pub async fn pop(&self, timeout: Duration) -> Result<Option<EvidenceJob>> {
        let payload = self
            .cache
            .queue_pop(keys::TASK_QUEUE, timeout)
            .await
            .map_err(broker_err)?;
        match payload {
            Some(payload) => {
                let job = serde_json::from_str(&payload)
                    .map_err(|e| EvidenceError::Render(format!("job decoding: {e}")))?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    pub async fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        self.cache
            .set_raw(
                &format!("{}{}", keys::TASK_STATUS, task_id),
                status.as_str(),
                ttl::TASK_STATUS,
            )
            .await
            .map_err(broker_err)?;
        Ok(())
    }

    /// Current task status, or None when the key has expired or the task
    /// was never enqueued.
    pub async fn status(&self, task_id: &str) -> Result<Option<TaskStatus>> {
        let raw = self
            .cache
            .get_raw(&format!("{}{}", keys::TASK_STATUS, task_id))
            .await
            .map_err(broker_err)?;
        Ok(raw.as_deref().and_then(TaskStatus::parse))
    }
}

fn broker_err(e: origin_db::DbError) -> EvidenceError {
    EvidenceError::BrokerUnavailable(e.to_string())
}
