//! ORIGIN Webhook Dispatcher
//!
//! Signs the exact raw body bytes it transmits (no re-serialization between
//! signing and sending), retries with bounded exponential backoff, records
//! every attempt, and dead-letters after exhaustion. The receiver-side
//! verification helper checks the same construction with replay protection.

pub mod dispatcher;
pub mod signing;

pub use dispatcher::{Dispatcher, DispatcherConfig, OutboundEvent, WebhookQueue};
pub use signing::{sign_payload, verify_signature, SignatureHeaders, DEFAULT_TOLERANCE_SECONDS};

use thiserror::Error;

use origin_crypto::CryptoError;
use origin_db::DbError;

/// Webhook errors
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Secret decryption failed: {0}")]
    Secret(#[from] CryptoError),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("Timestamp outside tolerance: skew {skew_seconds}s")]
    TimestampSkew { skew_seconds: i64 },
}

pub type Result<T> = std::result::Result<T, WebhookError>;
