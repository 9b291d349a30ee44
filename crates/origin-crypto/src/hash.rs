//! Hashing utilities for ORIGIN

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{canonical_bytes, CryptoResult};

/// Zero sentinel used as `prev_hash` for the first event of a tenant chain.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Compute SHA-256 hash of data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 hash and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Hash a value's canonical JSON encoding
pub fn hash_canonical<T: Serialize>(value: &T) -> CryptoResult<String> {
    Ok(sha256_hex(&canonical_bytes(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_zero_hash_is_64_zeroes() {
        assert_eq!(ZERO_HASH.len(), 64);
        assert!(ZERO_HASH.chars().all(|c| c == '0'));
    }

    #[test]
    fn test_hash_canonical_ignores_field_order() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(hash_canonical(&a).unwrap(), hash_canonical(&b).unwrap());
    }
}
