//! Webhook signing and verification
//!
//! Normative construction: `message = timestamp_bytes + b"." + raw_body_bytes`,
//! `signature = HMAC-SHA256(secret, message)`, transmitted as
//! `X-Origin-Signature: sha256=<hex>`. Receivers verify against the bytes
//! they received; verifying a re-encoded body is unsupported by design of
//! the scheme and will spuriously fail.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{Result, WebhookError};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted clock skew for received webhooks
pub const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

/// Header names carried by every delivery
#[derive(Debug, Clone)]
pub struct SignatureHeaders {
    pub signature: String,
    pub timestamp: String,
    pub event: String,
    pub event_id: String,
    pub correlation_id: String,
}

impl SignatureHeaders {
    pub const SIGNATURE: &'static str = "X-Origin-Signature";
    pub const TIMESTAMP: &'static str = "X-Origin-Timestamp";
    pub const EVENT: &'static str = "X-Origin-Event";
    pub const EVENT_ID: &'static str = "X-Origin-Event-Id";
    pub const CORRELATION_ID: &'static str = "X-Origin-Correlation-Id";
}

/// Sign raw body bytes for a delivery at `timestamp` (unix seconds).
pub fn sign_payload(secret: &[u8], timestamp: i64, raw_body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Receiver-side verification over the exact received bytes.
///
/// `now` is the receiver's clock (unix seconds); timestamps older or newer
/// than `tolerance_seconds` are rejected before any HMAC work.
pub fn verify_signature(
    secret: &[u8],
    timestamp: &str,
    raw_body: &[u8],
    signature_header: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<()> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::SignatureInvalid(format!("bad timestamp: {timestamp}")))?;

    let skew = (now - ts).abs();
    if skew > tolerance_seconds {
        return Err(WebhookError::TimestampSkew { skew_seconds: skew });
    }

    let expected = sign_payload(secret, ts, raw_body);
    let matches: bool = expected
        .as_bytes()
        .ct_eq(signature_header.as_bytes())
        .into();
    if !matches {
        return Err(WebhookError::SignatureInvalid(
            "signature mismatch".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test";

    #[test]
    fn test_known_construction() {
        // message = b"1700000000." + body
        let body = br#"{"a":1,"b":2}"#;
        let header = sign_payload(SECRET, 1_700_000_000, body);
        assert!(header.starts_with("sha256="));

        let mut mac = HmacSha256::new_from_slice(SECRET).unwrap();
        mac.update(b"1700000000.");
        mac.update(body);
        let expected = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
        assert_eq!(header, expected);
    }

    #[test]
    fn test_verify_roundtrip() {
        let body = br#"{"a":1,"b":2}"#;
        let header = sign_payload(SECRET, 1_700_000_000, body);
        verify_signature(SECRET, "1700000000", body, &header, 300, 1_700_000_030).unwrap();
    }

    #[test]
    fn test_reordered_json_fails() {
        let signed_body = br#"{"a":1,"b":2}"#;
        let reordered = br#"{"b":2,"a":1}"#;
        let header = sign_payload(SECRET, 1_700_000_000, signed_body);
        assert!(matches!(
            verify_signature(SECRET, "1700000000", reordered, &header, 300, 1_700_000_030),
            Err(WebhookError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let body = b"{}";
        let header = sign_payload(SECRET, 1_700_000_000, body);
        let err =
            verify_signature(SECRET, "1700000000", body, &header, 300, 1_700_000_301).unwrap_err();
        assert!(matches!(err, WebhookError::TimestampSkew { skew_seconds: 301 }));
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let body = b"{}";
        let header = sign_payload(SECRET, 1_700_000_400, body);
        assert!(matches!(
            verify_signature(SECRET, "1700000400", body, &header, 300, 1_700_000_000),
            Err(WebhookError::TimestampSkew { .. })
        ));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let body = b"{}";
        let header = sign_payload(SECRET, 1_700_000_000, body);
        assert!(verify_signature(b"other", "1700000000", body, &header, 300, 1_700_000_000).is_err());
    }
}
