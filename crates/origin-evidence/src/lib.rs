//! ORIGIN Evidence Pipeline
//!
//! Evidence packs are generated asynchronously: a request creates (or
//! reuses) a pack row, enqueues a task on the broker, and returns a poll
//! URL. Workers render the requested artifacts, store them in the blob
//! store under tenant-scoped keys, and flip the row to `ready`. Broker
//! trouble is transient and never marks a row `failed`; only deterministic
//! rendering errors do.

pub mod broker;
pub mod pipeline;
pub mod render;
pub mod worker;

pub use broker::{EvidenceJob, TaskBroker};
pub use pipeline::{EnqueueOutcome, EvidencePipeline, PollOutcome};
pub use render::{render_artifact, EvidenceDocument};
pub use worker::EvidenceWorker;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use origin_blob::BlobError;
use origin_crypto::sha256_hex;
use origin_db::DbError;

/// Evidence pipeline errors
#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("Database error: {0}")]
    Database(DbError),

    #[error("Blob store unavailable: {0}")]
    BlobUnavailable(String),

    #[error("Certificate not found")]
    CertificateNotFound,

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),
}

impl From<DbError> for EvidenceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Redis(msg) => EvidenceError::BrokerUnavailable(msg),
            other => EvidenceError::Database(other),
        }
    }
}

impl From<BlobError> for EvidenceError {
    fn from(e: BlobError) -> Self {
        EvidenceError::BlobUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EvidenceError>;

/// Artifact format of an evidence pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceFormat {
    Html,
    Json,
    Pdf,
}

impl EvidenceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceFormat::Html => "html",
            EvidenceFormat::Json => "json",
            EvidenceFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            EvidenceFormat::Html => "text/html; charset=utf-8",
            EvidenceFormat::Json => "application/json",
            EvidenceFormat::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for EvidenceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvidenceFormat {
    type Err = EvidenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(EvidenceFormat::Html),
            "json" => Ok(EvidenceFormat::Json),
            "pdf" => Ok(EvidenceFormat::Pdf),
            other => Err(EvidenceError::UnknownFormat(other.to_string())),
        }
    }
}

/// Deterministic task identity: the same (tenant, certificate, formats)
/// triple always produces the same task id, so duplicate requests collapse
/// onto one task.
pub fn derive_task_id(
    tenant_id: Uuid,
    certificate_id: Uuid,
    formats: &[EvidenceFormat],
) -> String {
    let mut sorted: Vec<&str> = formats.iter().map(|f| f.as_str()).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let pre_image = format!("{tenant_id}|{certificate_id}|{}", sorted.join(","));
    format!("evidence_pack_{}", &sha256_hex(pre_image.as_bytes())[..32])
}

/// Requeue identity for a stuck task.
pub fn requeue_task_id(current_task_id: &str, unix_ts: i64) -> String {
    format!("{current_task_id}_retry_{unix_ts}")
}

/// Blob key for one artifact: `{tenant_id}/{certificate_id}/{format}`.
pub fn artifact_key(tenant_id: Uuid, certificate_id: Uuid, format: EvidenceFormat) -> String {
    format!("{tenant_id}/{certificate_id}/{format}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_is_deterministic_and_order_insensitive() {
        let tenant = Uuid::new_v4();
        let cert = Uuid::new_v4();
        let a = derive_task_id(tenant, cert, &[EvidenceFormat::Pdf, EvidenceFormat::Json]);
        let b = derive_task_id(tenant, cert, &[EvidenceFormat::Json, EvidenceFormat::Pdf]);
        assert_eq!(a, b);
        assert!(a.starts_with("evidence_pack_"));
        assert_eq!(a.len(), "evidence_pack_".len() + 32);
    }

    #[test]
    fn test_task_id_differs_across_certificates() {
        let tenant = Uuid::new_v4();
        let a = derive_task_id(tenant, Uuid::new_v4(), &[EvidenceFormat::Json]);
        let b = derive_task_id(tenant, Uuid::new_v4(), &[EvidenceFormat::Json]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_requeue_suffix() {
        let id = requeue_task_id("evidence_pack_abc", 1_700_000_000);
        assert_eq!(id, "evidence_pack_abc_retry_1700000000");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<EvidenceFormat>().unwrap(), EvidenceFormat::Json);
        assert_eq!(" pdf ".parse::<EvidenceFormat>().unwrap(), EvidenceFormat::Pdf);
        assert!("docx".parse::<EvidenceFormat>().is_err());
    }

    #[test]
    fn test_artifact_key_layout() {
        let tenant = Uuid::new_v4();
        let cert = Uuid::new_v4();
        assert_eq!(
            artifact_key(tenant, cert, EvidenceFormat::Pdf),
            format!("{tenant}/{cert}/pdf")
        );
    }
}
