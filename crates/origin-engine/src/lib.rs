//! ORIGIN Engine - the synchronous decision path
//!
//! One request, one decision: identity resolution → features → inference →
//! policy → ledger append → certificate issuance → webhook enqueue, with
//! the persistent writes committed in a single transaction. Replays under
//! an idempotency key return the original bytes.

pub mod certificate;
pub mod ingest;

pub use certificate::{CertificateService, IssuedCertificate};
pub use ingest::{IngestOutcome, IngestPipeline, IngestRequest};
