//! The ingest pipeline
//!
//! Orchestrates one decision end to end. Everything that must be atomic —
//! Upload, RiskSignals, LedgerEvent, Certificate, and the idempotency
//! record — commits in a single transaction; a failure anywhere before
//! commit leaves no partial certificate or ledger event behind. The
//! webhook enqueue happens after commit and is best-effort.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use origin_crypto::{canonical_bytes, sha256_hex};
use origin_db::{Database, DbError, DbTenant};
use origin_ledger::LedgerService;
use origin_policy::PolicyProfile;
use origin_signals::{FeatureService, InferenceService};
use origin_types::{CorrelationId, OriginError, Pvid, Result, TransientService};
use origin_webhooks::{OutboundEvent, WebhookQueue};

use crate::certificate::CertificateService;

/// Event type published on every committed decision
pub const DECISION_EVENT: &str = "decision.created";

/// Body of POST /v1/ingest
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestRequest {
    pub account_external_id: String,
    pub upload_external_id: String,
    #[serde(default)]
    pub device_external_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl IngestRequest {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("account_external_id", &self.account_external_id),
            ("upload_external_id", &self.upload_external_id),
        ] {
            if value.is_empty() {
                return Err(OriginError::validation(field, "must not be empty"));
            }
            if value.len() > 255 {
                return Err(OriginError::validation(field, "must be at most 255 characters"));
            }
        }
        if !self.metadata.is_null() && !self.metadata.is_object() {
            return Err(OriginError::validation("metadata", "must be a JSON object"));
        }
        Ok(())
    }

    /// Request fingerprint for idempotency conflict detection.
    fn request_hash(&self) -> Result<String> {
        let bytes = canonical_bytes(self).map_err(internal)?;
        Ok(sha256_hex(&bytes))
    }
}

/// Result of one ingest call: the exact response bytes and whether they
/// were replayed from the idempotency table.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub body: Vec<u8>,
    pub replayed: bool,
}

/// The synchronous decision pipeline. Every stage suspends on I/O and
/// nothing blocks a thread; the whole path is expected to answer within a
/// few seconds at p95.
#[derive(Clone)]
pub struct IngestPipeline {
    db: Database,
    features: FeatureService,
    inference: InferenceService,
    ledger: LedgerService,
    certificates: CertificateService,
    webhook_queue: WebhookQueue,
}

impl IngestPipeline {
    pub fn new(
        db: Database,
        features: FeatureService,
        inference: InferenceService,
        ledger: LedgerService,
        certificates: CertificateService,
        webhook_queue: WebhookQueue,
    ) -> Self {
        Self {
            db,
            features,
            inference,
            ledger,
            certificates,
            webhook_queue,
        }
    }

    /// Execute one ingest for an authenticated tenant.
    pub async fn ingest(
        &self,
        tenant: &DbTenant,
        idempotency_key: Option<&str>,
        request: &IngestRequest,
        correlation_id: &CorrelationId,
    ) -> Result<IngestOutcome> {
        request.validate()?;
        let request_hash = request.request_hash()?;

        // Replay check first: a stored result is returned byte-identically.
        if let Some(key) = idempotency_key {
            if let Some(record) = self
                .db
                .idempotency()
                .find(tenant.id, key)
                .await
                .map_err(db_err)?
            {
                if record.request_hash != request_hash {
                    return Err(OriginError::Conflict {
                        reason: "idempotency key reused with a different body".to_string(),
                    });
                }
                return Ok(IngestOutcome {
                    body: record.response_body,
                    replayed: true,
                });
            }
        }

        let now = Utc::now();

        // Identity resolution.
        let account = self
            .db
            .identities()
            .upsert_account(tenant.id, &request.account_external_id)
            .await
            .map_err(db_err)?;
        let device = match &request.device_external_id {
            Some(external_id) => Some(
                self.db
                    .identities()
                    .upsert_device(tenant.id, external_id)
                    .await
                    .map_err(db_err)?,
            ),
            None => None,
        };
        let pvid = derive_pvid(tenant.id, request);

        // Features and signals.
        let features = self
            .features
            .compute(
                tenant.id,
                account.id,
                account.created_at,
                device.as_ref().map(|d| d.id),
                pvid.as_str(),
                now,
            )
            .await
            .map_err(|e| internal(e.to_string()))?;
        let signals = self.inference.score(&features, &request.metadata);

        // Policy evaluation under the tenant's profile.
        let profile = self.load_profile(tenant).await?;
        let policy_version = profile.version_string();
        let (decision, reasons) = origin_policy::evaluate(&profile, &features, &signals);

        let inputs_hash =
            CertificateService::inputs_hash(&policy_version, &features, &signals)
                .map_err(internal)?;
        let outputs_hash =
            CertificateService::outputs_hash(decision, &reasons).map_err(internal)?;

        // Atomic block: upload, ledger event, certificate, signals,
        // idempotency record.
        let upload_id = Uuid::new_v4();
        let certificate_id = Uuid::new_v4();
        let reasons_json = serde_json::to_value(&reasons).map_err(|e| internal(e.to_string()))?;
        let features_json = serde_json::to_value(&features).map_err(|e| internal(e.to_string()))?;

        let mut tx = self.db.pg.begin().await.map_err(|e| db_err(DbError::Query(e)))?;

        origin_db::UploadRepo::insert_tx(
            &mut tx,
            upload_id,
            tenant.id,
            &request.upload_external_id,
            account.id,
            device.as_ref().map(|d| d.id),
            pvid.as_str(),
            now,
            &request.metadata,
            &features_json,
            decision.as_str(),
            &reasons_json,
        )
        .await
        .map_err(db_err)?;

        let ledger_payload = json!({
            "upload_id": upload_id.to_string(),
            "decision": decision,
            "model_versions": {
                "risk": signals.risk_model_version,
                "anomaly": signals.anomaly_model_version,
            },
            "inputs_hash": inputs_hash,
            "outputs_hash": outputs_hash,
        });
        let ledger_event = self
            .ledger
            .append(&mut tx, tenant.id, ledger_payload, now)
            .await
            .map_err(|e| internal(e.to_string()))?;

        let issued = self
            .certificates
            .issue(
                certificate_id,
                tenant.id,
                upload_id,
                &policy_version,
                inputs_hash,
                outputs_hash,
                ledger_event.event_hash.clone(),
                now,
            )
            .await
            .map_err(internal)?;

        origin_db::CertificateRepo::insert_tx(
            &mut tx,
            certificate_id,
            tenant.id,
            upload_id,
            &policy_version,
            &issued.inputs_hash,
            &issued.outputs_hash,
            &issued.ledger_hash,
            &issued.key_id,
            issued.alg,
            &issued.signature,
            issued.issued_at,
        )
        .await
        .map_err(db_err)?;

        origin_db::UploadRepo::link_decision_tx(&mut tx, upload_id, certificate_id, ledger_event.id)
            .await
            .map_err(db_err)?;

        origin_db::UploadRepo::insert_signals_tx(
            &mut tx,
            upload_id,
            signals.risk,
            signals.assurance,
            signals.anomaly,
            signals.synthetic_likelihood,
            &signals.risk_model_version,
            &signals.anomaly_model_version,
            signals.computed_at,
        )
        .await
        .map_err(db_err)?;

        let response = json!({
            "decision": decision,
            "reasons": reasons,
            "certificate_id": origin_types::CertificateId(certificate_id).to_prefixed_string(),
            "upload_id": origin_types::UploadId(upload_id).to_prefixed_string(),
            "ledger_hash": ledger_event.event_hash,
            "tenant_sequence": ledger_event.tenant_sequence,
            "policy_version": policy_version,
            "issued_at": issued.issued_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        let body = serde_json::to_vec(&response).map_err(|e| internal(e.to_string()))?;

        if let Some(key) = idempotency_key {
            origin_db::IdempotencyRepo::insert_tx(&mut tx, tenant.id, key, &request_hash, &body, 200)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(|e| db_err(DbError::Query(e)))?;

        tracing::info!(
            tenant_id = %tenant.id,
            upload_id = %upload_id,
            certificate_id = %certificate_id,
            decision = %decision,
            tenant_sequence = ledger_event.tenant_sequence,
            correlation_id = %correlation_id,
            "decision issued"
        );

        // Post-commit, best-effort: the decision webhook.
        let event_body = serde_json::to_vec(&json!({
            "event": DECISION_EVENT,
            "certificate_id": origin_types::CertificateId(certificate_id).to_prefixed_string(),
            "upload_external_id": request.upload_external_id,
            "decision": decision,
            "ledger_hash": ledger_event.event_hash,
            "tenant_sequence": ledger_event.tenant_sequence,
            "issued_at": issued.issued_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }))
        .unwrap_or_default();
        self.webhook_queue.publish(OutboundEvent {
            tenant_id: tenant.id,
            event_type: DECISION_EVENT.to_string(),
            event_id: Uuid::new_v4(),
            body: event_body,
            correlation_id: correlation_id.as_str().to_string(),
        });

        Ok(IngestOutcome {
            body,
            replayed: false,
        })
    }

    async fn load_profile(&self, tenant: &DbTenant) -> Result<PolicyProfile> {
        let row = self
            .db
            .policy_profiles()
            .find(&tenant.policy_profile_id, tenant.policy_profile_version)
            .await
            .map_err(db_err)?
            .ok_or_else(|| {
                internal(format!(
                    "tenant references missing policy profile {}/{}",
                    tenant.policy_profile_id, tenant.policy_profile_version
                ))
            })?;
        PolicyProfile::from_rules(
            &row.id,
            row.version,
            &row.rules,
            &row.risk_model_version,
            &row.anomaly_model_version,
        )
        .map_err(|e| internal(e.to_string()))
    }
}

/// Provenance id from the stable submission attributes: tenant, account,
/// device, and the content hash when the submitter provides one.
fn derive_pvid(tenant_id: Uuid, request: &IngestRequest) -> Pvid {
    let content_hash = request
        .metadata
        .get("content_hash")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let pre_image = format!(
        "{tenant_id}|{}|{}|{content_hash}",
        request.account_external_id,
        request.device_external_id.as_deref().unwrap_or(""),
    );
    Pvid(sha256_hex(pre_image.as_bytes())[..32].to_string())
}

fn db_err(e: DbError) -> OriginError {
    if e.is_unique_violation() {
        return OriginError::Conflict {
            reason: "upload_external_id already ingested for this tenant".to_string(),
        };
    }
    match e {
        DbError::NotFound(resource) => OriginError::NotFound { resource },
        DbError::Connection(reason) => OriginError::TransientInfra {
            service: TransientService::Database,
            reason,
            retry_after_seconds: 5,
        },
        other => OriginError::internal(other.to_string()),
    }
}

fn internal(e: impl ToString) -> OriginError {
    OriginError::internal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(account: &str, upload: &str) -> IngestRequest {
        IngestRequest {
            account_external_id: account.to_string(),
            upload_external_id: upload.to_string(),
            device_external_id: Some("dev-1".to_string()),
            metadata: json!({"title": "x"}),
        }
    }

    #[test]
    fn test_validation_rejects_empty_ids() {
        assert!(request("", "up1").validate().is_err());
        assert!(request("u1", "").validate().is_err());
        assert!(request("u1", "up1").validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_non_object_metadata() {
        let mut r = request("u1", "up1");
        r.metadata = json!([1, 2, 3]);
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_request_hash_ignores_field_order_only() {
        let a = request("u1", "up1").request_hash().unwrap();
        let b = request("u1", "up1").request_hash().unwrap();
        assert_eq!(a, b);
        let c = request("u1", "up2").request_hash().unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_pvid_is_deterministic_per_provenance() {
        let tenant = Uuid::new_v4();
        let a = derive_pvid(tenant, &request("u1", "up1"));
        let b = derive_pvid(tenant, &request("u1", "up2"));
        // Different uploads, same provenance attributes.
        assert_eq!(a, b);

        let other_account = derive_pvid(tenant, &request("u2", "up1"));
        assert_ne!(a, other_account);

        let other_tenant = derive_pvid(Uuid::new_v4(), &request("u1", "up1"));
        assert_ne!(a, other_tenant);
    }

    #[test]
    fn test_pvid_incorporates_content_hash() {
        let tenant = Uuid::new_v4();
        let mut with_hash = request("u1", "up1");
        with_hash.metadata = json!({"content_hash": "abc123"});
        assert_ne!(derive_pvid(tenant, &with_hash), derive_pvid(tenant, &request("u1", "up1")));
    }
}
