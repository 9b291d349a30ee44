//! Application state shared across handlers
//!
//! Assembled once at the composition root and cloned into every handler.
//! No process-wide singletons: everything a handler touches arrives here.

use std::sync::Arc;

use origin_auth::{ApiKeyService, AuthContext};
use origin_blob::BlobStore;
use origin_crypto::{EncryptionProvider, Signer};
use origin_db::Database;
use origin_engine::IngestPipeline;
use origin_evidence::EvidencePipeline;
use origin_ledger::LedgerService;
use origin_signals::InferenceService;
use origin_types::Environment;
use origin_webhooks::Dispatcher;

use crate::metrics::Metrics;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub environment: Environment,
    pub db: Database,
    pub auth: Arc<AuthContext>,
    pub api_keys: ApiKeyService,
    pub pipeline: IngestPipeline,
    pub evidence: EvidencePipeline,
    pub dispatcher: Arc<Dispatcher>,
    pub ledger: LedgerService,
    pub inference: InferenceService,
    pub signer: Arc<dyn Signer>,
    pub encryption: Arc<dyn EncryptionProvider>,
    pub blob: Arc<dyn BlobStore>,
    pub metrics: Arc<Metrics>,
}
