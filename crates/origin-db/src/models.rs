//! Database models - mapped from PostgreSQL tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Tenant & API Key Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbTenant {
    pub id: Uuid,
    pub display_name: String,
    /// JSON array of CIDR or exact-IP strings; null = no allowlist
    pub ip_allowlist: Option<serde_json::Value>,
    pub rate_limit_per_minute: i32,
    pub rate_limit_burst: i32,
    pub policy_profile_id: String,
    pub policy_profile_version: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbApiKey {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// First 8 characters of the raw key; indexed for O(1) lookup
    pub prefix: String,
    /// HMAC-SHA256(server_secret, raw_key), hex
    pub digest: String,
    /// JSON array of scope strings
    pub scopes: serde_json::Value,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Identity & Upload Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbAccount {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub external_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbDevice {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub external_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbUpload {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub external_id: String,
    pub account_id: Uuid,
    pub device_id: Option<Uuid>,
    pub pvid: String,
    pub received_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
    /// Features as computed at decision time, persisted for replay
    pub decision_inputs_json: serde_json::Value,
    pub decision: String,
    /// Rules that fired, as recorded on the certificate's outputs
    pub decision_reasons: serde_json::Value,
    pub certificate_id: Option<Uuid>,
    pub ledger_event_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbRiskSignals {
    pub id: Uuid,
    pub upload_id: Uuid,
    pub risk: f64,
    pub assurance: f64,
    pub anomaly: f64,
    pub synthetic_likelihood: f64,
    pub risk_model_version: String,
    pub anomaly_model_version: String,
    pub computed_at: DateTime<Utc>,
}

// ============================================================================
// Policy Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbPolicyProfile {
    pub id: String,
    pub version: i32,
    pub rules: serde_json::Value,
    pub risk_model_version: String,
    pub anomaly_model_version: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Certificate & Ledger Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbCertificate {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub upload_id: Uuid,
    pub policy_version: String,
    pub inputs_hash: String,
    pub outputs_hash: String,
    pub ledger_hash: String,
    pub key_id: String,
    pub alg: String,
    /// base64url-encoded signature over the canonical certificate payload
    pub signature: String,
    pub signature_encoding: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbLedgerEvent {
    pub id: i64,
    pub tenant_id: Uuid,
    pub tenant_sequence: i64,
    pub event_timestamp: DateTime<Utc>,
    /// Canonical JSON bytes, stored verbatim; the sole hash pre-image
    pub canonical_event_json: Vec<u8>,
    pub event_hash: String,
    pub prev_hash: String,
}

// ============================================================================
// Evidence Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbEvidencePack {
    pub certificate_id: Uuid,
    pub tenant_id: Uuid,
    pub status: String,
    /// JSON array of requested format strings, sorted
    pub formats_requested: serde_json::Value,
    /// JSON object format -> storage key
    pub storage_keys: serde_json::Value,
    /// JSON object format -> artifact SHA-256 hex
    pub artifact_hashes: serde_json::Value,
    /// JSON object format -> artifact size in bytes
    pub artifact_sizes: serde_json::Value,
    pub task_id: String,
    pub task_status: Option<String>,
    pub pipeline_event: Option<String>,
    pub error_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Webhook Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbWebhook {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub url: String,
    /// JSON array of subscribed event type strings
    pub events: serde_json::Value,
    /// Secret encrypted by the configured encryption provider
    pub encrypted_secret: Vec<u8>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbWebhookDelivery {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event_id: Uuid,
    pub event_type: String,
    pub attempt: i32,
    pub status: String,
    pub response_code: Option<i32>,
    pub correlation_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Idempotency Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbIdempotencyRecord {
    pub tenant_id: Uuid,
    pub idempotency_key: String,
    /// SHA-256 of the canonicalized request body, for conflict detection
    pub request_hash: String,
    /// Exact response bytes returned to the original request
    pub response_body: Vec<u8>,
    pub status_code: i32,
    pub created_at: DateTime<Utc>,
}
