//! Canonical JSON encoding
//!
//! The single well-specified encoding used as every hash and signature
//! pre-image in ORIGIN: object keys sorted bytewise, UTF-8, no insignificant
//! whitespace, numbers in serde_json's shortest round-trip form. The ledger
//! and the certificate service both encode through here, and the stored
//! canonical bytes are the sole pre-image for their hashes.

use serde::Serialize;
use serde_json::Value;

use crate::{CryptoError, CryptoResult};

/// Encode any serializable value into canonical JSON bytes.
pub fn canonical_bytes<T: Serialize>(value: &T) -> CryptoResult<Vec<u8>> {
    let value = serde_json::to_value(value)
        .map_err(|e| CryptoError::CanonicalEncoding(e.to_string()))?;
    let mut out = Vec::new();
    write_canonical(&value, &mut out)?;
    Ok(out)
}

/// Encode any serializable value into a canonical JSON string.
pub fn canonical_string<T: Serialize>(value: &T) -> CryptoResult<String> {
    let bytes = canonical_bytes(value)?;
    String::from_utf8(bytes).map_err(|e| CryptoError::CanonicalEncoding(e.to_string()))
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> CryptoResult<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_json_string(key, out);
                out.push(b':');
                // Key came out of the map it was collected from.
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_json_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_are_sorted() {
        let v = json!({"b": 1, "a": 2, "c": {"z": true, "a": false}});
        let s = canonical_string(&v).unwrap();
        assert_eq!(s, r#"{"a":2,"b":1,"c":{"a":false,"z":true}}"#);
    }

    #[test]
    fn test_no_insignificant_whitespace() {
        let v = json!({"list": [1, 2, 3], "name": "x"});
        let s = canonical_string(&v).unwrap();
        assert!(!s.contains(' '));
    }

    #[test]
    fn test_string_escaping() {
        let v = json!({"k": "line\nbreak \"quoted\""});
        let s = canonical_string(&v).unwrap();
        assert_eq!(s, r#"{"k":"line\nbreak \"quoted\""}"#);
    }

    #[test]
    fn test_encoding_is_stable_across_field_order() {
        let a = json!({"x": 1, "y": [true, null]});
        let b = json!({"y": [true, null], "x": 1});
        assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }

    #[test]
    fn test_unicode_passes_through_utf8() {
        let v = json!({"title": "héllo ☃"});
        let s = canonical_string(&v).unwrap();
        assert_eq!(s, "{\"title\":\"héllo ☃\"}");
    }
}
