//! Secrets at rest
//!
//! Webhook secrets are stored encrypted. The local provider derives an
//! AES-256-GCM key from a configured secret and a per-installation random
//! salt (both required, neither a constant); outside development/test the
//! local provider is rejected at startup and KMS must be used.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use aws_sdk_kms::primitives::Blob;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use origin_types::Environment;

use crate::{CryptoError, CryptoResult};

const NONCE_LEN: usize = 12;
const PBKDF2_ROUNDS: u32 = 600_000;

/// Encrypt/decrypt capability for secrets at rest
#[async_trait]
pub trait EncryptionProvider: Send + Sync {
    async fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>>;
    async fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>>;
}

// ============================================================================
// Local AES-256-GCM provider
// ============================================================================

/// AES-256-GCM with a PBKDF2-derived key. Ciphertext layout: nonce || body.
pub struct LocalEncryption {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for LocalEncryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEncryption").finish_non_exhaustive()
    }
}

impl LocalEncryption {
    /// Derive the key from the configured secret and installation salt.
    pub fn new(secret: &str, salt: &[u8], environment: Environment) -> CryptoResult<Self> {
        if !environment.allows_local_secrets() {
            return Err(CryptoError::ProviderRejected {
                environment: environment.to_string(),
                reason: "local encryption is only allowed in development/test".to_string(),
            });
        }
        if salt.is_empty() {
            return Err(CryptoError::KeyLoadFailed(
                "LOCAL_ENCRYPTION_SALT is required for the local provider".to_string(),
            ));
        }
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        })
    }
}

#[async_trait]
impl EncryptionProvider for LocalEncryption {
    async fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let body = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let mut out = nonce.to_vec();
        out.extend_from_slice(&body);
        Ok(out)
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        if ciphertext.len() <= NONCE_LEN {
            return Err(CryptoError::DecryptionFailed("ciphertext too short".to_string()));
        }
        let (nonce, body) = ciphertext.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}

// ============================================================================
// AWS KMS provider
// ============================================================================

/// Envelope-free KMS encrypt/decrypt; secrets are small enough for direct calls.
pub struct KmsEncryption {
    client: aws_sdk_kms::Client,
    key_id: String,
}

impl KmsEncryption {
    pub fn new(client: aws_sdk_kms::Client, key_id: String) -> Self {
        Self { client, key_id }
    }
}

#[async_trait]
impl EncryptionProvider for KmsEncryption {
    async fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let output = self
            .client
            .encrypt()
            .key_id(&self.key_id)
            .plaintext(Blob::new(plaintext))
            .send()
            .await
            .map_err(|e| CryptoError::Kms(format!("encrypt: {e}")))?;
        Ok(output
            .ciphertext_blob()
            .ok_or_else(|| CryptoError::EncryptionFailed("KMS returned no ciphertext".to_string()))?
            .as_ref()
            .to_vec())
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        let output = self
            .client
            .decrypt()
            .key_id(&self.key_id)
            .ciphertext_blob(Blob::new(ciphertext))
            .send()
            .await
            .map_err(|e| CryptoError::Kms(format!("decrypt: {e}")))?;
        Ok(output
            .plaintext()
            .ok_or_else(|| CryptoError::DecryptionFailed("KMS returned no plaintext".to_string()))?
            .as_ref()
            .to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_roundtrip() {
        let enc = LocalEncryption::new("test-secret", b"per-install-salt", Environment::Test).unwrap();
        let secret = b"whsec_abcdef012345";

        let ct = enc.encrypt(secret).await.unwrap();
        assert_ne!(&ct[NONCE_LEN..], secret.as_slice());
        assert_eq!(enc.decrypt(&ct).await.unwrap(), secret);
    }

    #[tokio::test]
    async fn test_nonces_differ_between_calls() {
        let enc = LocalEncryption::new("test-secret", b"per-install-salt", Environment::Test).unwrap();
        let a = enc.encrypt(b"same").await.unwrap();
        let b = enc.encrypt(b"same").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_fails() {
        let enc = LocalEncryption::new("test-secret", b"per-install-salt", Environment::Test).unwrap();
        let mut ct = enc.encrypt(b"secret").await.unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(enc.decrypt(&ct).await.is_err());
    }

    #[test]
    fn test_local_rejected_in_production() {
        let err = LocalEncryption::new("s", b"salt", Environment::Production).unwrap_err();
        assert!(matches!(err, CryptoError::ProviderRejected { .. }));
    }

    #[test]
    fn test_salt_is_required() {
        let err = LocalEncryption::new("s", b"", Environment::Development).unwrap_err();
        assert!(matches!(err, CryptoError::KeyLoadFailed(_)));
    }
}
