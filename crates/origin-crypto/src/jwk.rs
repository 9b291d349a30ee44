//! JWK / JWKS types
//!
//! Public verification keys are advertised as a standard JWK Set at
//! `/v1/keys/jwks.json`. Only RSA signature keys exist in ORIGIN, always
//! with `alg = PS256`. Multiple keys may be published; older keys remain
//! listed for verification after rotation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};

use crate::{CryptoError, CryptoResult, SIGNING_ALG};

/// A single RSA signature JWK
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub alg: String,
    pub kid: String,
    /// Modulus, base64url without padding
    pub n: String,
    /// Public exponent, base64url without padding
    pub e: String,
}

impl Jwk {
    /// Build a JWK from an RSA public key.
    pub fn from_rsa_public_key(key: &RsaPublicKey, kid: &str) -> Self {
        Self {
            kty: "RSA".to_string(),
            use_: "sig".to_string(),
            alg: SIGNING_ALG.to_string(),
            kid: kid.to_string(),
            n: URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        }
    }

    /// Reconstruct the RSA public key from the JWK parameters.
    pub fn to_rsa_public_key(&self) -> CryptoResult<RsaPublicKey> {
        if self.kty != "RSA" {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "unsupported kty: {}",
                self.kty
            )));
        }
        let n = URL_SAFE_NO_PAD
            .decode(&self.n)
            .map_err(|e| CryptoError::InvalidKeyFormat(format!("bad modulus: {e}")))?;
        let e = URL_SAFE_NO_PAD
            .decode(&self.e)
            .map_err(|e| CryptoError::InvalidKeyFormat(format!("bad exponent: {e}")))?;
        RsaPublicKey::new(
            rsa::BigUint::from_bytes_be(&n),
            rsa::BigUint::from_bytes_be(&e),
        )
        .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))
    }
}

/// A JWK Set as served at the keys endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;

    #[test]
    fn test_jwk_roundtrip() {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public = private.to_public_key();

        let jwk = Jwk::from_rsa_public_key(&public, "key-1");
        assert_eq!(jwk.alg, "PS256");
        assert_eq!(jwk.use_, "sig");

        let restored = jwk.to_rsa_public_key().unwrap();
        assert_eq!(restored, public);
    }
}
