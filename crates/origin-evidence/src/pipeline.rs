//! Evidence pack request/poll orchestration
//!
//! State machine: `pending → {ready, failed}`. Enqueue validates
//! certificate ownership, creates or reuses the pack row, and pushes a job
//! to the broker. A broker outage leaves the row `pending` with
//! `error_code = "BROKER_UNAVAILABLE"` and surfaces as a 503 so the client
//! retries; it never becomes a terminal failure. A pending row older than
//! the stuck threshold is requeued under a suffixed task id.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use origin_blob::BlobStore;
use origin_db::{Database, DbEvidencePack};
use origin_types::{EvidencePackStatus, PipelineEvent, TaskStatus};

use crate::broker::{EvidenceJob, TaskBroker};
use crate::{derive_task_id, requeue_task_id, EvidenceError, EvidenceFormat, Result};

const POLL_RETRY_AFTER_SECONDS: u64 = 5;

/// Result of POST /v1/evidence-packs
#[derive(Debug, Clone)]
pub struct EnqueueOutcome {
    pub certificate_id: Uuid,
    pub status: EvidencePackStatus,
    pub task_id: String,
    pub task_status: Option<TaskStatus>,
    pub pipeline_event: PipelineEvent,
    pub retry_after_seconds: u64,
}

/// Result of GET /v1/evidence-packs/{certificate_id}
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Pending {
        task_id: String,
        task_status: Option<TaskStatus>,
        retry_after_seconds: u64,
    },
    Ready {
        signed_urls: BTreeMap<String, String>,
        artifact_hashes: BTreeMap<String, String>,
        artifact_sizes: BTreeMap<String, u64>,
    },
    Failed {
        error_code: String,
    },
}

/// Request-side evidence pipeline
#[derive(Clone)]
pub struct EvidencePipeline {
    db: Database,
    broker: TaskBroker,
    blob: Arc<dyn BlobStore>,
    signed_url_ttl: Duration,
    stuck_after: chrono::Duration,
}

impl EvidencePipeline {
    pub fn new(
        db: Database,
        broker: TaskBroker,
        blob: Arc<dyn BlobStore>,
        signed_url_ttl: Duration,
        stuck_after: Duration,
    ) -> Self {
        Self {
            db,
            broker,
            blob,
            signed_url_ttl,
            stuck_after: chrono::Duration::from_std(stuck_after)
                .unwrap_or_else(|_| chrono::Duration::minutes(10)),
        }
    }

    /// Create or reuse a pack and enqueue its generation task.
    pub async fn request(
        &self,
        tenant_id: Uuid,
        certificate_id: Uuid,
        formats: &[EvidenceFormat],
        correlation_id: &str,
    ) -> Result<EnqueueOutcome> {
        // Ownership gate: certificates of other tenants are indistinguishable
        // from missing ones.
        self.db
            .certificates()
            .find_for_tenant(tenant_id, certificate_id)
            .await?
            .ok_or(EvidenceError::CertificateNotFound)?;

        let mut sorted: Vec<EvidenceFormat> = formats.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let existing = self.db.evidence().find_by_certificate(certificate_id).await?;
        let pack = match existing {
            Some(pack) => {
                // An existing row owns its format set; the task keeps
                // rendering what was originally requested.
                let stored: Vec<String> =
                    serde_json::from_value(pack.formats_requested.clone()).unwrap_or_default();
                let stored: Vec<EvidenceFormat> =
                    stored.iter().filter_map(|f| f.parse().ok()).collect();
                if !stored.is_empty() {
                    sorted = stored;
                }
                pack
            }
            None => {
                let task_id = derive_task_id(tenant_id, certificate_id, &sorted);
                let formats_json = serde_json::to_value(
                    sorted.iter().map(|f| f.as_str()).collect::<Vec<_>>(),
                )
                .unwrap_or_default();
                self.db
                    .evidence()
                    .insert_pending(certificate_id, tenant_id, formats_json, &task_id)
                    .await?
            }
        };

        match EvidencePackStatus::parse(&pack.status) {
            Some(EvidencePackStatus::Ready) => Ok(EnqueueOutcome {
                certificate_id,
                status: EvidencePackStatus::Ready,
                task_id: pack.task_id,
                task_status: Some(TaskStatus::Success),
                pipeline_event: PipelineEvent::UpdatedFromTaskResult,
                retry_after_seconds: 0,
            }),
            // A failed pack re-attempts only through an explicit requeue:
            // POSTing again is that explicit signal, and the task id gains
            // a fresh suffix.
            Some(EvidencePackStatus::Failed) => {
                let task_id = requeue_task_id(&pack.task_id, Utc::now().timestamp());
                self.db.evidence().requeue(certificate_id, &task_id).await?;
                self.enqueue_pending(tenant_id, certificate_id, &sorted, &task_id, correlation_id)
                    .await
            }
            _ => {
                let stuck = pack.updated_at < Utc::now() - self.stuck_after;
                let task_id = if stuck {
                    let task_id = requeue_task_id(&pack.task_id, Utc::now().timestamp());
                    self.db.evidence().requeue(certificate_id, &task_id).await?;
                    task_id
                } else {
                    pack.task_id.clone()
                };
                let outcome = self
                    .enqueue_pending(tenant_id, certificate_id, &sorted, &task_id, correlation_id)
                    .await?;
                if stuck {
                    Ok(EnqueueOutcome {
                        pipeline_event: PipelineEvent::StuckRequeued,
                        ..outcome
                    })
                } else {
                    Ok(outcome)
                }
            }
        }
    }

    async fn enqueue_pending(
        &self,
        tenant_id: Uuid,
        certificate_id: Uuid,
        formats: &[EvidenceFormat],
        task_id: &str,
        correlation_id: &str,
    ) -> Result<EnqueueOutcome> {
        let job = EvidenceJob {
            task_id: task_id.to_string(),
            tenant_id,
            certificate_id,
            formats: formats.iter().map(|f| f.as_str().to_string()).collect(),
            correlation_id: correlation_id.to_string(),
        };

        if let Err(e) = self.broker.enqueue(&job).await {
            // Row stays pending; the error code on the row lets operators
            // see why nothing is progressing.
            self.db
                .evidence()
                .record_observation(certificate_id, None, PipelineEvent::Enqueued.as_str(), Some("BROKER_UNAVAILABLE"))
                .await?;
            return Err(e);
        }

        self.db
            .evidence()
            .record_observation(
                certificate_id,
                Some(TaskStatus::Pending.as_str()),
                PipelineEvent::Enqueued.as_str(),
                None,
            )
            .await?;

        Ok(EnqueueOutcome {
            certificate_id,
            status: EvidencePackStatus::Pending,
            task_id: task_id.to_string(),
            task_status: Some(TaskStatus::Pending),
            pipeline_event: PipelineEvent::Enqueued,
            retry_after_seconds: POLL_RETRY_AFTER_SECONDS,
        })
    }

    /// Poll the pack's state.
    pub async fn poll(&self, tenant_id: Uuid, certificate_id: Uuid) -> Result<PollOutcome> {
        self.db
            .certificates()
            .find_for_tenant(tenant_id, certificate_id)
            .await?
            .ok_or(EvidenceError::CertificateNotFound)?;

        let pack = self
            .db
            .evidence()
            .find_by_certificate(certificate_id)
            .await?
            .ok_or(EvidenceError::CertificateNotFound)?;

        match EvidencePackStatus::parse(&pack.status) {
            Some(EvidencePackStatus::Ready) => self.ready_outcome(&pack).await,
            Some(EvidencePackStatus::Failed) => Ok(PollOutcome::Failed {
                error_code: pack
                    .error_code
                    .unwrap_or_else(|| "GENERATION_FAILED".to_string()),
            }),
            _ => {
                // Pending: consult the task result. Broker unreachable means
                // the result cannot be consulted; surface 503, not failure.
                let task_status = self.broker.status(&pack.task_id).await?;
                self.db
                    .evidence()
                    .record_observation(
                        certificate_id,
                        task_status.map(|s| s.as_str()),
                        PipelineEvent::Polling.as_str(),
                        pack.error_code.as_deref(),
                    )
                    .await?;
                Ok(PollOutcome::Pending {
                    task_id: pack.task_id,
                    task_status,
                    retry_after_seconds: POLL_RETRY_AFTER_SECONDS,
                })
            }
        }
    }

    async fn ready_outcome(&self, pack: &DbEvidencePack) -> Result<PollOutcome> {
        let keys: BTreeMap<String, String> =
            serde_json::from_value(pack.storage_keys.clone()).unwrap_or_default();
        let artifact_hashes: BTreeMap<String, String> =
            serde_json::from_value(pack.artifact_hashes.clone()).unwrap_or_default();
        let artifact_sizes: BTreeMap<String, u64> =
            serde_json::from_value(pack.artifact_sizes.clone()).unwrap_or_default();

        let mut signed_urls = BTreeMap::new();
        for (format, key) in &keys {
            let url = self.blob.presign(key, self.signed_url_ttl).await?;
            signed_urls.insert(format.clone(), url);
        }

        Ok(PollOutcome::Ready {
            signed_urls,
            artifact_hashes,
            artifact_sizes,
        })
    }

    /// Storage key for streaming a single artifact through the download
    /// endpoint (used for file:// URLs in development).
    pub async fn artifact_for_download(
        &self,
        tenant_id: Uuid,
        certificate_id: Uuid,
        format: EvidenceFormat,
    ) -> Result<Vec<u8>> {
        self.db
            .certificates()
            .find_for_tenant(tenant_id, certificate_id)
            .await?
            .ok_or(EvidenceError::CertificateNotFound)?;
        let pack = self
            .db
            .evidence()
            .find_by_certificate(certificate_id)
            .await?
            .ok_or(EvidenceError::CertificateNotFound)?;

        let keys: BTreeMap<String, String> =
            serde_json::from_value(pack.storage_keys.clone()).unwrap_or_default();
        let key = keys
            .get(format.as_str())
            .ok_or(EvidenceError::CertificateNotFound)?;
        Ok(self.blob.get(key).await?)
    }

    /// Periodic sweep: requeue pending packs whose last update predates the
    /// stuck threshold.
    pub async fn requeue_stuck(&self) -> Result<usize> {
        let cutoff = Utc::now() - self.stuck_after;
        let stuck = self.db.evidence().find_stuck(cutoff).await?;
        let mut requeued = 0;
        for pack in stuck {
            let formats: Vec<String> =
                serde_json::from_value(pack.formats_requested.clone()).unwrap_or_default();
            let formats: Vec<EvidenceFormat> = formats
                .iter()
                .filter_map(|f| f.parse().ok())
                .collect();
            let task_id = requeue_task_id(&pack.task_id, Utc::now().timestamp());
            self.db.evidence().requeue(pack.certificate_id, &task_id).await?;
            let job = EvidenceJob {
                task_id,
                tenant_id: pack.tenant_id,
                certificate_id: pack.certificate_id,
                formats: formats.iter().map(|f| f.as_str().to_string()).collect(),
                correlation_id: format!("stuck-requeue-{}", pack.certificate_id),
            };
            match self.broker.enqueue(&job).await {
                Ok(()) => requeued += 1,
                Err(e) => {
                    tracing::warn!(certificate_id = %pack.certificate_id, error = %e, "stuck requeue failed");
                }
            }
        }
        Ok(requeued)
    }
}
