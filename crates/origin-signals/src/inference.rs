//! Model inference
//!
//! Scores are produced by a coefficient file loaded at startup: a pair of
//! pinned model versions plus logistic-regression weights over the feature
//! vector. Inference is fully deterministic for a given model file, and the
//! file's SHA-256 is surfaced at the status endpoint so operators can pin
//! exactly what is running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use origin_crypto::sha256_hex;
use origin_types::{Features, Signals};

use crate::{Result, SignalError};

/// On-disk model coefficient file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub risk_model_version: String,
    pub anomaly_model_version: String,
    pub risk_weights: RiskWeights,
    pub anomaly_weights: AnomalyWeights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskWeights {
    pub bias: f64,
    pub velocity_24h: f64,
    pub prior_quarantines: f64,
    pub prior_rejects: f64,
    pub account_age_days: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyWeights {
    pub bias: f64,
    pub device_account_divergence: f64,
    pub velocity_24h: f64,
    pub missing_device: f64,
}

/// Status surfaced at GET /v1/models/status
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub loaded_versions: Vec<String>,
    pub file_sha256: String,
    pub loaded_at: DateTime<Utc>,
}

/// Scores uploads under the loaded model coefficients
#[derive(Clone)]
pub struct InferenceService {
    model: ModelFile,
    file_sha256: String,
    loaded_at: DateTime<Utc>,
}

impl InferenceService {
    /// Load coefficients from a JSON model file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| SignalError::ModelLoad(format!("{}: {e}", path.display())))?;
        let model: ModelFile = serde_json::from_slice(&bytes)
            .map_err(|e| SignalError::ModelLoad(format!("{}: {e}", path.display())))?;
        Ok(Self {
            file_sha256: sha256_hex(&bytes),
            model,
            loaded_at: Utc::now(),
        })
    }

    /// Built-in coefficients for development and tests.
    pub fn builtin() -> Self {
        let model = ModelFile {
            risk_model_version: "risk-2024.06.1".to_string(),
            anomaly_model_version: "anomaly-2024.05.2".to_string(),
            risk_weights: RiskWeights {
                bias: -2.5,
                velocity_24h: 0.06,
                prior_quarantines: 0.8,
                prior_rejects: 1.4,
                account_age_days: -0.01,
            },
            anomaly_weights: AnomalyWeights {
                bias: -2.0,
                device_account_divergence: 0.08,
                velocity_24h: 0.03,
                missing_device: 0.9,
            },
        };
        let encoded = serde_json::to_vec(&model).unwrap_or_default();
        Self {
            file_sha256: sha256_hex(&encoded),
            model,
            loaded_at: Utc::now(),
        }
    }

    /// Score one upload. `metadata` may carry a `declared_synthetic` hint
    /// which feeds the synthetic-likelihood signal.
    pub fn score(&self, features: &Features, metadata: &serde_json::Value) -> Signals {
        let rw = &self.model.risk_weights;
        let raw_risk = rw.bias
            + rw.velocity_24h * features.upload_velocity_24h as f64
            + rw.prior_quarantines * features.prior_quarantine_count as f64
            + rw.prior_rejects * features.prior_reject_count as f64
            + rw.account_age_days * features.account_age_days as f64;
        let risk = sigmoid(raw_risk);

        let aw = &self.model.anomaly_weights;
        let divergence =
            (features.device_velocity_24h - features.upload_velocity_24h).unsigned_abs() as f64;
        let missing_device = if features.device_velocity_24h == 0 && features.upload_velocity_24h > 0
        {
            1.0
        } else {
            0.0
        };
        let raw_anomaly = aw.bias
            + aw.device_account_divergence * divergence
            + aw.velocity_24h * features.upload_velocity_24h as f64
            + aw.missing_device * missing_device;
        let anomaly = sigmoid(raw_anomaly);

        let declared_synthetic = metadata
            .get("declared_synthetic")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let synthetic_likelihood = if declared_synthetic {
            1.0
        } else {
            clamp01(anomaly * 0.6 + risk * 0.2)
        };

        let assurance = clamp01(1.0 - risk * 0.7 - anomaly * 0.3);

        Signals {
            risk: clamp01(risk),
            assurance,
            anomaly: clamp01(anomaly),
            synthetic_likelihood,
            risk_model_version: self.model.risk_model_version.clone(),
            anomaly_model_version: self.model.anomaly_model_version.clone(),
            computed_at: Utc::now(),
        }
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            loaded_versions: vec![
                self.model.risk_model_version.clone(),
                self.model.anomaly_model_version.clone(),
            ],
            file_sha256: self.file_sha256.clone(),
            loaded_at: self.loaded_at,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clean_features() -> Features {
        Features {
            account_age_days: 365,
            upload_velocity_24h: 1,
            device_velocity_24h: 1,
            prior_quarantine_count: 0,
            prior_reject_count: 0,
        }
    }

    #[test]
    fn test_scores_are_in_unit_interval() {
        let service = InferenceService::builtin();
        let hostile = Features {
            account_age_days: 0,
            upload_velocity_24h: 500,
            device_velocity_24h: 0,
            prior_quarantine_count: 20,
            prior_reject_count: 20,
        };
        for features in [clean_features(), hostile] {
            let s = service.score(&features, &json!({}));
            for value in [s.risk, s.assurance, s.anomaly, s.synthetic_likelihood] {
                assert!((0.0..=1.0).contains(&value), "{value} out of range");
            }
        }
    }

    #[test]
    fn test_history_raises_risk() {
        let service = InferenceService::builtin();
        let clean = service.score(&clean_features(), &json!({}));
        let mut dirty_features = clean_features();
        dirty_features.prior_reject_count = 5;
        let dirty = service.score(&dirty_features, &json!({}));
        assert!(dirty.risk > clean.risk);
    }

    #[test]
    fn test_declared_synthetic_saturates_signal() {
        let service = InferenceService::builtin();
        let s = service.score(&clean_features(), &json!({"declared_synthetic": true}));
        assert_eq!(s.synthetic_likelihood, 1.0);
    }

    #[test]
    fn test_versions_are_pinned_on_signals() {
        let service = InferenceService::builtin();
        let s = service.score(&clean_features(), &json!({}));
        assert_eq!(s.risk_model_version, "risk-2024.06.1");
        assert_eq!(s.anomaly_model_version, "anomaly-2024.05.2");
        let status = service.status();
        assert_eq!(status.loaded_versions.len(), 2);
        assert_eq!(status.file_sha256.len(), 64);
    }
}
