//! Evidence generation worker
//!
//! Consumes jobs from the broker, renders each requested format, stores the
//! artifacts, and transitions the pack row. Failure semantics: rendering
//! errors are deterministic and mark the row `failed`; blob or broker
//! trouble is transient, leaves the row `pending`, and re-enqueues the job.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use origin_blob::BlobStore;
use origin_crypto::sha256_hex;
use origin_db::Database;
use origin_types::TaskStatus;

use crate::broker::{EvidenceJob, TaskBroker};
use crate::render::{render_artifact, EvidenceDocument};
use crate::{artifact_key, EvidenceError, EvidenceFormat, Result};

const POP_TIMEOUT: Duration = Duration::from_secs(5);
const TRANSIENT_BACKOFF: Duration = Duration::from_secs(5);

/// Background worker for evidence generation
pub struct EvidenceWorker {
    db: Database,
    broker: TaskBroker,
    blob: Arc<dyn BlobStore>,
}

impl EvidenceWorker {
    pub fn new(db: Database, broker: TaskBroker, blob: Arc<dyn BlobStore>) -> Self {
        Self { db, broker, blob }
    }

    /// Consume jobs until shutdown is signalled.
    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("evidence worker stopping");
                        return;
                    }
                }
                job = self.broker.pop(POP_TIMEOUT) => {
                    match job {
                        Ok(Some(job)) => self.handle(job).await,
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "broker pop failed, backing off");
                            tokio::time::sleep(TRANSIENT_BACKOFF).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&self, job: EvidenceJob) {
        tracing::info!(
            task_id = %job.task_id,
            certificate_id = %job.certificate_id,
            correlation_id = %job.correlation_id,
            "evidence task started"
        );
        if let Err(e) = self.broker.set_status(&job.task_id, TaskStatus::Started).await {
            tracing::warn!(error = %e, "failed to record STARTED status");
        }

        match self.execute(&job).await {
            Ok(true) => {
                let _ = self.broker.set_status(&job.task_id, TaskStatus::Success).await;
            }
            Ok(false) => {
                // Stale job: the row moved on (requeued or already terminal).
                tracing::debug!(task_id = %job.task_id, "evidence task superseded, skipping");
            }
            Err(EvidenceError::Render(reason)) => {
                // Deterministic failure: terminal.
                tracing::error!(task_id = %job.task_id, reason = %reason, "evidence rendering failed");
                let _ = self.broker.set_status(&job.task_id, TaskStatus::Failure).await;
                if let Err(e) = self
                    .db
                    .evidence()
                    .mark_failed(job.certificate_id, "RENDER_FAILED")
                    .await
                {
                    tracing::error!(error = %e, "failed to mark evidence pack failed");
                }
            }
            Err(e) => {
                // Transient failure: stay pending, retry later.
                tracing::warn!(task_id = %job.task_id, error = %e, "transient evidence failure, re-enqueueing");
                let _ = self.broker.set_status(&job.task_id, TaskStatus::Retry).await;
                tokio::time::sleep(TRANSIENT_BACKOFF).await;
                if let Err(e) = self.broker.enqueue(&job).await {
                    tracing::warn!(error = %e, "re-enqueue failed; stuck sweep will recover");
                }
            }
        }
    }

    /// Returns Ok(false) when the job no longer matches the row.
    async fn execute(&self, job: &EvidenceJob) -> Result<bool> {
        let pack = match self.db.evidence().find_by_certificate(job.certificate_id).await? {
            Some(pack) => pack,
            None => return Ok(false),
        };
        if pack.status != "pending" || pack.task_id != job.task_id {
            return Ok(false);
        }

        let certificate = self
            .db
            .certificates()
            .find_for_tenant(job.tenant_id, job.certificate_id)
            .await?
            .ok_or(EvidenceError::CertificateNotFound)?;
        let upload = self
            .db
            .uploads()
            .find_by_id(certificate.upload_id)
            .await?
            .ok_or_else(|| EvidenceError::Render("upload row missing".to_string()))?;
        let signals = self.db.uploads().find_signals(certificate.upload_id).await?;

        let document = EvidenceDocument::from_rows(&certificate, &upload, signals.as_ref());

        let mut storage_keys = BTreeMap::new();
        let mut artifact_hashes = BTreeMap::new();
        let mut artifact_sizes = BTreeMap::new();

        for format_name in &job.formats {
            let format: EvidenceFormat = format_name.parse()?;
            let bytes = render_artifact(&document, format)?;
            let key = artifact_key(job.tenant_id, job.certificate_id, format);

            self.blob
                .put(&key, bytes.clone(), format.content_type())
                .await?;

            artifact_hashes.insert(format.as_str().to_string(), sha256_hex(&bytes));
            artifact_sizes.insert(format.as_str().to_string(), bytes.len() as u64);
            storage_keys.insert(format.as_str().to_string(), key);
        }

        let updated = self
            .db
            .evidence()
            .mark_ready(
                job.certificate_id,
                serde_json::to_value(&storage_keys).unwrap_or_default(),
                serde_json::to_value(&artifact_hashes).unwrap_or_default(),
                serde_json::to_value(&artifact_sizes).unwrap_or_default(),
            )
            .await?;

        if updated {
            tracing::info!(
                task_id = %job.task_id,
                certificate_id = %job.certificate_id,
                formats = ?job.formats,
                "evidence pack ready"
            );
        }
        Ok(updated)
    }
}
