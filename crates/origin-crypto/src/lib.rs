//! ORIGIN Crypto - Cryptographic primitives for upload governance
//!
//! This crate provides:
//! - Canonical JSON encoding (the single hash/signature pre-image format)
//! - Hashing (SHA-256)
//! - Certificate signing (PS256: local RSA key or AWS KMS) and JWKS export
//! - Secret encryption at rest (local AES-256-GCM or AWS KMS)
//!
//! # Security Invariant
//!
//! The JWK `alg`, the certificate `alg`, and the actual signature algorithm
//! are the same value (`PS256`) for every issued certificate.

pub mod canonical;
pub mod encryption;
pub mod hash;
pub mod jwk;
pub mod signer;

pub use canonical::*;
pub use encryption::*;
pub use hash::*;
pub use jwk::*;
pub use signer::*;

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key load failed: {0}")]
    KeyLoadFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Canonical encoding failed: {0}")]
    CanonicalEncoding(String),

    #[error("KMS error: {0}")]
    Kms(String),

    #[error("Provider not allowed in {environment}: {reason}")]
    ProviderRejected {
        environment: String,
        reason: String,
    },
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// The one signature algorithm ORIGIN issues certificates under.
pub const SIGNING_ALG: &str = "PS256";
