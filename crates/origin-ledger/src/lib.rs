//! ORIGIN Ledger - append-only audit trail
//!
//! The ledger is:
//! - Tenant-scoped (one chain per tenant)
//! - Gap-free (sequences run 1, 2, 3, ... under a row lock)
//! - Hash-chained (every event carries the previous event's hash)
//! - Offline-verifiable (stored canonical bytes are the sole pre-image)
//!
//! # Invariants
//!
//! 1. `(tenant_id, tenant_sequence)` is unique and strictly increasing from 1
//! 2. `event_hash == SHA-256(canonical_event_json)` for every event
//! 3. `prev_hash` equals the prior event's `event_hash`; the zero sentinel
//!    opens each chain
//! 4. Appends commit inside the caller's transaction or not at all

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use origin_crypto::{canonical_bytes, sha256_hex, CryptoError, ZERO_HASH};
use origin_db::{DbError, DbLedgerEvent};

/// Errors that can occur in ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] CryptoError),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Database(DbError::Query(e))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Outcome of an offline chain verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub ok: bool,
    /// Failure description naming the offending sequence, when not ok
    pub error: Option<String>,
    pub events_checked: u64,
}

impl ChainVerification {
    fn ok(events_checked: u64) -> Self {
        Self {
            ok: true,
            error: None,
            events_checked,
        }
    }

    fn fail(error: String, events_checked: u64) -> Self {
        Self {
            ok: false,
            error: Some(error),
            events_checked,
        }
    }
}

/// Append and verify operations over the ledger tables
#[derive(Clone)]
pub struct LedgerService {
    pool: PgPool,
}

impl LedgerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one event inside the caller's transaction.
    ///
    /// Takes the tenant's sequence row lock, links to the previous event's
    /// hash, and stores the canonical bytes verbatim. The event becomes
    /// visible only when the caller commits.
    pub async fn append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<DbLedgerEvent> {
        // Sequence rows are created with the tenant, but tolerate tenants
        // provisioned before this table existed.
        sqlx::query("INSERT INTO tenant_sequences (tenant_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(tenant_id)
            .execute(&mut **tx)
            .await?;

        let sequence: i64 = sqlx::query_scalar(
            "SELECT next_sequence FROM tenant_sequences WHERE tenant_id = $1 FOR UPDATE",
        )
        .bind(tenant_id)
        .fetch_one(&mut **tx)
        .await?;

        let prev_hash: String = sqlx::query_scalar(
            r#"
            SELECT event_hash FROM ledger_events
            WHERE tenant_id = $1
            ORDER BY tenant_sequence DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&mut **tx)
        .await?
        .unwrap_or_else(|| ZERO_HASH.to_string());

        let encoded = encode_event(tenant_id, sequence, now, &prev_hash, &payload)?;

        let event = sqlx::query_as::<_, DbLedgerEvent>(
            r#"
            INSERT INTO ledger_events (tenant_id, tenant_sequence, event_timestamp,
                                       canonical_event_json, event_hash, prev_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(sequence)
        .bind(now)
        .bind(&encoded.canonical_json)
        .bind(&encoded.event_hash)
        .bind(&prev_hash)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query("UPDATE tenant_sequences SET next_sequence = $1 WHERE tenant_id = $2")
            .bind(sequence + 1)
            .bind(tenant_id)
            .execute(&mut **tx)
            .await?;

        tracing::debug!(
            tenant_id = %tenant_id,
            sequence,
            event_hash = %event.event_hash,
            "ledger event appended"
        );
        Ok(event)
    }

    /// Walk a tenant's chain in sequence order and check every invariant.
    pub async fn verify_chain(&self, tenant_id: Uuid) -> Result<ChainVerification> {
        let events = sqlx::query_as::<_, DbLedgerEvent>(
            "SELECT * FROM ledger_events WHERE tenant_id = $1 ORDER BY tenant_sequence ASC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(verify_events(&events))
    }
}

/// Canonical encoding of one event
struct EncodedEvent {
    canonical_json: Vec<u8>,
    event_hash: String,
}

/// Build the canonical bytes and hash for an event. The timestamp is
/// rendered to microsecond RFC 3339 so the stored bytes re-encode
/// identically on replay.
fn encode_event(
    tenant_id: Uuid,
    sequence: i64,
    timestamp: DateTime<Utc>,
    prev_hash: &str,
    payload: &serde_json::Value,
) -> Result<EncodedEvent> {
    let event = json!({
        "tenant_id": tenant_id.to_string(),
        "tenant_sequence": sequence,
        "event_timestamp": timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        "prev_hash": prev_hash,
        "payload": payload,
    });
    let canonical_json = canonical_bytes(&event)?;
    let event_hash = sha256_hex(&canonical_json);
    Ok(EncodedEvent {
        canonical_json,
        event_hash,
    })
}

/// Pure verification over an ordered slice of events.
pub fn verify_events(events: &[DbLedgerEvent]) -> ChainVerification {
    let mut prev_hash = ZERO_HASH.to_string();
    for (i, event) in events.iter().enumerate() {
        let expected_sequence = i as i64 + 1;
        if event.tenant_sequence != expected_sequence {
            return ChainVerification::fail(
                format!("sequence_gap at sequence={}", event.tenant_sequence),
                i as u64,
            );
        }
        if sha256_hex(&event.canonical_event_json) != event.event_hash {
            return ChainVerification::fail(
                format!("hash_mismatch at sequence={}", event.tenant_sequence),
                i as u64,
            );
        }
        if event.prev_hash != prev_hash {
            return ChainVerification::fail(
                format!("prev_hash_mismatch at sequence={}", event.tenant_sequence),
                i as u64,
            );
        }
        prev_hash = event.event_hash.clone();
    }
    ChainVerification::ok(events.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(
        tenant_id: Uuid,
        sequence: i64,
        prev_hash: &str,
        payload: serde_json::Value,
    ) -> DbLedgerEvent {
        let timestamp = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let encoded = encode_event(tenant_id, sequence, timestamp, prev_hash, &payload).unwrap();
        DbLedgerEvent {
            id: sequence,
            tenant_id,
            tenant_sequence: sequence,
            event_timestamp: timestamp,
            canonical_event_json: encoded.canonical_json,
            event_hash: encoded.event_hash,
            prev_hash: prev_hash.to_string(),
        }
    }

    fn make_chain(tenant_id: Uuid, len: usize) -> Vec<DbLedgerEvent> {
        let mut events = Vec::new();
        let mut prev_hash = ZERO_HASH.to_string();
        for seq in 1..=len as i64 {
            let event = make_event(tenant_id, seq, &prev_hash, json!({"n": seq}));
            prev_hash = event.event_hash.clone();
            events.push(event);
        }
        events
    }

    use serde_json::json;

    #[test]
    fn test_empty_chain_verifies() {
        let result = verify_events(&[]);
        assert!(result.ok);
        assert_eq!(result.events_checked, 0);
    }

    #[test]
    fn test_valid_chain_verifies() {
        let events = make_chain(Uuid::new_v4(), 5);
        let result = verify_events(&events);
        assert!(result.ok, "{:?}", result.error);
        assert_eq!(result.events_checked, 5);
    }

    #[test]
    fn test_tampered_canonical_json_detected() {
        let mut events = make_chain(Uuid::new_v4(), 2);
        events[0].canonical_event_json[10] ^= 0x01;
        let result = verify_events(&events);
        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("hash_mismatch at sequence=1"));
    }

    #[test]
    fn test_sequence_gap_detected() {
        let mut events = make_chain(Uuid::new_v4(), 3);
        events.remove(1);
        let result = verify_events(&events);
        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("sequence_gap at sequence=3"));
    }

    #[test]
    fn test_broken_link_detected() {
        let tenant_id = Uuid::new_v4();
        let mut events = make_chain(tenant_id, 3);
        // Re-issue event 2 with a forged prev_hash; its own hash is
        // consistent, only the link is broken.
        let forged_prev = sha256_hex(b"forged");
        events[1] = make_event(tenant_id, 2, &forged_prev, json!({"n": 2}));
        let result = verify_events(&events);
        assert!(!result.ok);
        assert_eq!(
            result.error.as_deref(),
            Some("prev_hash_mismatch at sequence=2")
        );
    }

    #[test]
    fn test_first_event_must_use_zero_sentinel() {
        let tenant_id = Uuid::new_v4();
        let bad_first = make_event(tenant_id, 1, &sha256_hex(b"not-zero"), json!({}));
        let result = verify_events(&[bad_first]);
        assert!(!result.ok);
        assert_eq!(
            result.error.as_deref(),
            Some("prev_hash_mismatch at sequence=1")
        );
    }

    #[test]
    fn test_stored_bytes_are_the_sole_preimage() {
        let events = make_chain(Uuid::new_v4(), 1);
        // Recomputing from the stored bytes reproduces the hash exactly.
        assert_eq!(
            sha256_hex(&events[0].canonical_event_json),
            events[0].event_hash
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let tenant_id = Uuid::new_v4();
        let timestamp = Utc::now();
        let payload = json!({"b": 2, "a": 1});
        let one = encode_event(tenant_id, 1, timestamp, ZERO_HASH, &payload).unwrap();
        let two = encode_event(tenant_id, 1, timestamp, ZERO_HASH, &payload).unwrap();
        assert_eq!(one.canonical_json, two.canonical_json);
        assert_eq!(one.event_hash, two.event_hash);
    }
}
