//! Certificate signing
//!
//! One trait, two variants: a local RSA key loaded from PEM (development
//! only) and an AWS KMS key. Both sign RSASSA-PSS with SHA-256, salt length
//! equal to the digest length, MGF1-SHA-256 — advertised as `PS256` in the
//! JWKS, on the certificate, and nowhere contradicted.

use async_trait::async_trait;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::{MessageType, SigningAlgorithmSpec};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use origin_types::Environment;

use crate::{sha256_hex, CryptoError, CryptoResult, Jwk, JwkSet, SIGNING_ALG};

/// A signature with the key that produced it
#[derive(Debug, Clone)]
pub struct SignedDigest {
    pub signature: Vec<u8>,
    pub key_id: String,
    pub alg: &'static str,
}

/// Signing capability used by the certificate service
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign a message, returning signature bytes and the key id used.
    async fn sign(&self, message: &[u8]) -> CryptoResult<SignedDigest>;

    /// Public JWK Set; may list retired keys alongside the active one.
    fn jwks(&self) -> JwkSet;

    /// Key id new signatures are issued under.
    fn active_key_id(&self) -> &str;

    /// Advertised algorithm; PS256 for every ORIGIN signer.
    fn alg(&self) -> &'static str {
        SIGNING_ALG
    }
}

/// Verify a PS256 signature against a JWK. Used by tests and by the SDK
/// helper documentation; the service itself never verifies its own
/// certificates on the hot path.
pub fn verify_ps256(jwk: &Jwk, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
    let public = jwk.to_rsa_public_key()?;
    let verifying_key = VerifyingKey::<Sha256>::new(public);
    let signature = Signature::try_from(signature)
        .map_err(|e| CryptoError::VerificationFailed(e.to_string()))?;
    verifying_key
        .verify(message, &signature)
        .map_err(|e| CryptoError::VerificationFailed(e.to_string()))
}

// ============================================================================
// Local RSA signer
// ============================================================================

/// RSA private key loaded from PEM. Rejected outside development/test.
#[derive(Debug)]
pub struct LocalRsaSigner {
    signing_key: BlindedSigningKey<Sha256>,
    public_key: RsaPublicKey,
    key_id: String,
    /// Retired public keys still published for verification
    retired: Vec<Jwk>,
}

impl LocalRsaSigner {
    /// Load from a PEM-encoded private key (PKCS#8 or PKCS#1).
    pub fn from_pem(pem: &str, environment: Environment) -> CryptoResult<Self> {
        if !environment.allows_local_secrets() {
            return Err(CryptoError::ProviderRejected {
                environment: environment.to_string(),
                reason: "local signing keys are only allowed in development/test".to_string(),
            });
        }
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| CryptoError::KeyLoadFailed(e.to_string()))?;
        Ok(Self::from_key(private))
    }

    /// Build from an in-memory key. Key id is a fingerprint of the public
    /// modulus, so the same key always advertises the same kid.
    pub fn from_key(private: RsaPrivateKey) -> Self {
        use rsa::traits::PublicKeyParts;
        let public = private.to_public_key();
        let key_id = format!("local-{}", &sha256_hex(&public.n().to_bytes_be())[..16]);
        Self {
            signing_key: BlindedSigningKey::<Sha256>::new(private),
            public_key: public,
            key_id,
            retired: Vec::new(),
        }
    }

    /// Publish a retired public key (PEM, SPKI) for verification only.
    pub fn publish_retired_key(&mut self, pem: &str, kid: &str) -> CryptoResult<()> {
        let public = RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| CryptoError::KeyLoadFailed(e.to_string()))?;
        self.retired.push(Jwk::from_rsa_public_key(&public, kid));
        Ok(())
    }
}

#[async_trait]
impl Signer for LocalRsaSigner {
    async fn sign(&self, message: &[u8]) -> CryptoResult<SignedDigest> {
        let mut rng = rand::thread_rng();
        let signature = self.signing_key.sign_with_rng(&mut rng, message);
        Ok(SignedDigest {
            signature: signature.to_vec(),
            key_id: self.key_id.clone(),
            alg: SIGNING_ALG,
        })
    }

    fn jwks(&self) -> JwkSet {
        let mut keys = vec![Jwk::from_rsa_public_key(&self.public_key, &self.key_id)];
        keys.extend(self.retired.iter().cloned());
        JwkSet { keys }
    }

    fn active_key_id(&self) -> &str {
        &self.key_id
    }
}

// ============================================================================
// AWS KMS signer
// ============================================================================

/// Remote signer backed by an asymmetric KMS key
pub struct KmsSigner {
    client: aws_sdk_kms::Client,
    key_id: String,
    /// Public half, fetched once at startup
    jwk: Jwk,
}

impl KmsSigner {
    /// Connect and fetch the public key. Fails fast when the key is
    /// unreachable, not an RSA key, or the caller lacks kms:GetPublicKey.
    pub async fn connect(client: aws_sdk_kms::Client, key_id: String) -> CryptoResult<Self> {
        let output = client
            .get_public_key()
            .key_id(&key_id)
            .send()
            .await
            .map_err(|e| CryptoError::Kms(format!("get_public_key({key_id}): {e}")))?;

        let spki = output
            .public_key()
            .ok_or_else(|| CryptoError::Kms("KMS returned no public key".to_string()))?;
        let public = RsaPublicKey::from_public_key_der(spki.as_ref())
            .map_err(|e| CryptoError::InvalidKeyFormat(format!("KMS key is not RSA: {e}")))?;

        let supports_pss = output
            .signing_algorithms()
            .iter()
            .any(|a| matches!(a, SigningAlgorithmSpec::RsassaPssSha256));
        if !supports_pss {
            return Err(CryptoError::Kms(format!(
                "key {key_id} does not support RSASSA_PSS_SHA_256"
            )));
        }

        let jwk = Jwk::from_rsa_public_key(&public, &key_id);
        Ok(Self {
            client,
            key_id,
            jwk,
        })
    }
}

#[async_trait]
impl Signer for KmsSigner {
    async fn sign(&self, message: &[u8]) -> CryptoResult<SignedDigest> {
        let output = self
            .client
            .sign()
            .key_id(&self.key_id)
            .message(Blob::new(message))
            .message_type(MessageType::Raw)
            .signing_algorithm(SigningAlgorithmSpec::RsassaPssSha256)
            .send()
            .await
            .map_err(|e| CryptoError::SigningFailed(format!("KMS sign: {e}")))?;

        let signature = output
            .signature()
            .ok_or_else(|| CryptoError::SigningFailed("KMS returned no signature".to_string()))?;

        Ok(SignedDigest {
            signature: signature.as_ref().to_vec(),
            key_id: self.key_id.clone(),
            alg: SIGNING_ALG,
        })
    }

    fn jwks(&self) -> JwkSet {
        JwkSet {
            keys: vec![self.jwk.clone()],
        }
    }

    fn active_key_id(&self) -> &str {
        &self.key_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signer() -> LocalRsaSigner {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        LocalRsaSigner::from_key(private)
    }

    #[tokio::test]
    async fn test_sign_verify_roundtrip() {
        let signer = test_signer();
        let message = b"canonical certificate payload";

        let signed = signer.sign(message).await.unwrap();
        assert_eq!(signed.alg, "PS256");
        assert_eq!(signed.key_id, signer.active_key_id());

        let jwk = signer.jwks().find(&signed.key_id).cloned().unwrap();
        verify_ps256(&jwk, message, &signed.signature).unwrap();
    }

    #[tokio::test]
    async fn test_single_bit_change_invalidates() {
        let signer = test_signer();
        let message = b"canonical certificate payload".to_vec();

        let signed = signer.sign(&message).await.unwrap();
        let jwk = signer.jwks().find(&signed.key_id).cloned().unwrap();

        let mut tampered = message.clone();
        tampered[0] ^= 0x01;
        assert!(verify_ps256(&jwk, &tampered, &signed.signature).is_err());

        let mut bad_sig = signed.signature.clone();
        bad_sig[0] ^= 0x01;
        assert!(verify_ps256(&jwk, &message, &bad_sig).is_err());
    }

    #[test]
    fn test_local_rejected_outside_development() {
        let err = LocalRsaSigner::from_pem("irrelevant", Environment::Production).unwrap_err();
        assert!(matches!(err, CryptoError::ProviderRejected { .. }));
    }

    #[test]
    fn test_jwk_alg_matches_signer_alg() {
        let signer = test_signer();
        let jwks = signer.jwks();
        for key in &jwks.keys {
            assert_eq!(key.alg, signer.alg());
        }
    }
}
