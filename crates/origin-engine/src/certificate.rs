//! Certificate issuance
//!
//! A certificate binds one decision to its inputs, outputs, and ledger
//! position. `inputs_hash` and `outputs_hash` are SHA-256 over canonical
//! JSON; the signed payload is itself canonical JSON, so verification can
//! be reproduced from the stored columns alone. The signature algorithm,
//! the certificate's `alg` column, and the JWKS advertisement are all the
//! signer's PS256.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use uuid::Uuid;

use origin_crypto::{canonical_bytes, hash_canonical, CryptoResult, Signer};
use origin_types::{Decision, Features, Reason, Signals};

/// A signed certificate ready for persistence
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub certificate_id: Uuid,
    pub inputs_hash: String,
    pub outputs_hash: String,
    pub ledger_hash: String,
    pub key_id: String,
    pub alg: &'static str,
    /// base64url, no padding
    pub signature: String,
    pub issued_at: DateTime<Utc>,
}

/// Builds and signs certificates
#[derive(Clone)]
pub struct CertificateService {
    signer: Arc<dyn Signer>,
}

impl CertificateService {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }

    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    /// Hash of the decision inputs: policy version, features, signals, and
    /// the model versions that produced the signals.
    pub fn inputs_hash(
        policy_version: &str,
        features: &Features,
        signals: &Signals,
    ) -> CryptoResult<String> {
        let inputs = json!({
            "policy_version": policy_version,
            "features": features,
            "signals": {
                "risk": signals.risk,
                "assurance": signals.assurance,
                "anomaly": signals.anomaly,
                "synthetic_likelihood": signals.synthetic_likelihood,
                "computed_at": signals.computed_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            },
            "model_versions": {
                "risk": signals.risk_model_version,
                "anomaly": signals.anomaly_model_version,
            },
        });
        hash_canonical(&inputs)
    }

    /// Hash of the decision outputs: the decision and every fired rule.
    pub fn outputs_hash(decision: Decision, reasons: &[Reason]) -> CryptoResult<String> {
        let outputs = json!({
            "decision": decision,
            "reasons": reasons,
        });
        hash_canonical(&outputs)
    }

    /// The canonical byte payload a certificate signature covers.
    #[allow(clippy::too_many_arguments)]
    pub fn signing_payload(
        certificate_id: Uuid,
        tenant_id: Uuid,
        upload_id: Uuid,
        policy_version: &str,
        inputs_hash: &str,
        outputs_hash: &str,
        ledger_hash: &str,
        issued_at: DateTime<Utc>,
        alg: &str,
        key_id: &str,
    ) -> CryptoResult<Vec<u8>> {
        let payload = json!({
            "certificate_id": certificate_id.to_string(),
            "tenant_id": tenant_id.to_string(),
            "upload_id": upload_id.to_string(),
            "policy_version": policy_version,
            "inputs_hash": inputs_hash,
            "outputs_hash": outputs_hash,
            "ledger_hash": ledger_hash,
            "issued_at": issued_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            "alg": alg,
            "key_id": key_id,
        });
        canonical_bytes(&payload)
    }

    /// Sign a certificate for one decision, binding it to `ledger_hash`.
    #[allow(clippy::too_many_arguments)]
    pub async fn issue(
        &self,
        certificate_id: Uuid,
        tenant_id: Uuid,
        upload_id: Uuid,
        policy_version: &str,
        inputs_hash: String,
        outputs_hash: String,
        ledger_hash: String,
        issued_at: DateTime<Utc>,
    ) -> CryptoResult<IssuedCertificate> {
        let alg = self.signer.alg();
        let key_id = self.signer.active_key_id().to_string();

        let payload = Self::signing_payload(
            certificate_id,
            tenant_id,
            upload_id,
            policy_version,
            &inputs_hash,
            &outputs_hash,
            &ledger_hash,
            issued_at,
            alg,
            &key_id,
        )?;

        let signed = self.signer.sign(&payload).await?;

        Ok(IssuedCertificate {
            certificate_id,
            inputs_hash,
            outputs_hash,
            ledger_hash,
            key_id: signed.key_id,
            alg: signed.alg,
            signature: URL_SAFE_NO_PAD.encode(signed.signature),
            issued_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use origin_crypto::{verify_ps256, LocalRsaSigner};

    fn signals() -> Signals {
        Signals {
            risk: 0.25,
            assurance: 0.8,
            anomaly: 0.1,
            synthetic_likelihood: 0.05,
            risk_model_version: "risk-2024.06.1".to_string(),
            anomaly_model_version: "anomaly-2024.05.2".to_string(),
            computed_at: DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    fn features() -> Features {
        Features::first_sighting()
    }

    #[test]
    fn test_inputs_hash_changes_with_policy_version() {
        let a = CertificateService::inputs_hash("default/1", &features(), &signals()).unwrap();
        let b = CertificateService::inputs_hash("default/2", &features(), &signals()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_outputs_hash_depends_on_reasons() {
        let none = CertificateService::outputs_hash(Decision::Review, &[]).unwrap();
        let one = CertificateService::outputs_hash(
            Decision::Review,
            &[Reason {
                rule: "anomaly_above_review_threshold".to_string(),
                decision: Decision::Review,
                detail: "anomaly 0.800 >= 0.700".to_string(),
            }],
        )
        .unwrap();
        assert_ne!(none, one);
    }

    #[tokio::test]
    async fn test_issue_and_verify_roundtrip() {
        let mut rng = rand::thread_rng();
        let private = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let signer = Arc::new(LocalRsaSigner::from_key(private));
        let service = CertificateService::new(signer.clone());

        let certificate_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let upload_id = Uuid::new_v4();
        let issued_at = Utc::now();
        let inputs_hash =
            CertificateService::inputs_hash("default/1", &features(), &signals()).unwrap();
        let outputs_hash = CertificateService::outputs_hash(Decision::Allow, &[]).unwrap();
        let ledger_hash = "ab".repeat(32);

        let issued = service
            .issue(
                certificate_id,
                tenant_id,
                upload_id,
                "default/1",
                inputs_hash.clone(),
                outputs_hash.clone(),
                ledger_hash.clone(),
                issued_at,
            )
            .await
            .unwrap();

        assert_eq!(issued.alg, "PS256");

        // Reconstruct the payload from the persisted columns and verify.
        let payload = CertificateService::signing_payload(
            certificate_id,
            tenant_id,
            upload_id,
            "default/1",
            &inputs_hash,
            &outputs_hash,
            &ledger_hash,
            issued_at,
            issued.alg,
            &issued.key_id,
        )
        .unwrap();
        let signature = URL_SAFE_NO_PAD.decode(&issued.signature).unwrap();
        let jwk = signer.jwks().find(&issued.key_id).cloned().unwrap();
        verify_ps256(&jwk, &payload, &signature).unwrap();
    }
}
