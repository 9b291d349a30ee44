//! ORIGIN Policy - deterministic decision evaluation
//!
//! The policy engine maps (profile, features, signals) to a decision and
//! the list of rules that fired. The function is pure: no clock, no I/O,
//! no randomness. Model signals are inputs to thresholds, never overriding
//! authorities. Thresholds are data carried by the versioned profile; only
//! the decision lattice and its tie-break order (REJECT > QUARANTINE >
//! REVIEW > ALLOW) are code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use origin_types::{Decision, Features, Reason, Signals};

/// Policy evaluation errors
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Malformed policy rules: {0}")]
    MalformedRules(String),
}

/// A versioned rule set. `version_string` (e.g. `default/3`) participates
/// in the certificate's inputs and outputs hash pre-images, so bumping the
/// version changes the outputs hash even for identical inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyProfile {
    pub id: String,
    pub version: i32,
    pub thresholds: Thresholds,
    pub risk_model_version: String,
    pub anomaly_model_version: String,
}

impl PolicyProfile {
    /// Deserialize the rules document stored on a policy_profiles row.
    pub fn from_rules(
        id: &str,
        version: i32,
        rules: &serde_json::Value,
        risk_model_version: &str,
        anomaly_model_version: &str,
    ) -> Result<Self, PolicyError> {
        let thresholds: Thresholds = serde_json::from_value(rules.clone())
            .map_err(|e| PolicyError::MalformedRules(e.to_string()))?;
        Ok(Self {
            id: id.to_string(),
            version,
            thresholds,
            risk_model_version: risk_model_version.to_string(),
            anomaly_model_version: anomaly_model_version.to_string(),
        })
    }

    pub fn version_string(&self) -> String {
        format!("{}/{}", self.id, self.version)
    }
}

/// Threshold document carried by a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub reject_risk_at: f64,
    pub quarantine_risk_at: f64,
    pub review_risk_at: f64,
    pub quarantine_synthetic_at: f64,
    pub review_anomaly_at: f64,
    pub review_velocity_24h_at: i64,
    pub quarantine_prior_rejects_at: i64,
    pub allow_assurance_floor: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            reject_risk_at: 0.9,
            quarantine_risk_at: 0.75,
            review_risk_at: 0.5,
            quarantine_synthetic_at: 0.85,
            review_anomaly_at: 0.7,
            review_velocity_24h_at: 50,
            quarantine_prior_rejects_at: 3,
            allow_assurance_floor: 0.2,
        }
    }
}

/// Evaluate a profile against one upload's features and signals.
pub fn evaluate(
    profile: &PolicyProfile,
    features: &Features,
    signals: &Signals,
) -> (Decision, Vec<Reason>) {
    let t = &profile.thresholds;
    let mut reasons: Vec<Reason> = Vec::new();

    let mut fire = |rule: &str, decision: Decision, detail: String| {
        reasons.push(Reason {
            rule: rule.to_string(),
            decision,
            detail,
        });
    };

    if signals.risk >= t.reject_risk_at {
        fire(
            "risk_above_reject_threshold",
            Decision::Reject,
            format!("risk {:.3} >= {:.3}", signals.risk, t.reject_risk_at),
        );
    } else if signals.risk >= t.quarantine_risk_at {
        fire(
            "risk_above_quarantine_threshold",
            Decision::Quarantine,
            format!("risk {:.3} >= {:.3}", signals.risk, t.quarantine_risk_at),
        );
    } else if signals.risk >= t.review_risk_at {
        fire(
            "risk_above_review_threshold",
            Decision::Review,
            format!("risk {:.3} >= {:.3}", signals.risk, t.review_risk_at),
        );
    }

    if signals.synthetic_likelihood >= t.quarantine_synthetic_at {
        fire(
            "synthetic_likelihood_above_quarantine_threshold",
            Decision::Quarantine,
            format!(
                "synthetic_likelihood {:.3} >= {:.3}",
                signals.synthetic_likelihood, t.quarantine_synthetic_at
            ),
        );
    }

    if signals.anomaly >= t.review_anomaly_at {
        fire(
            "anomaly_above_review_threshold",
            Decision::Review,
            format!("anomaly {:.3} >= {:.3}", signals.anomaly, t.review_anomaly_at),
        );
    }

    if features.prior_reject_count >= t.quarantine_prior_rejects_at {
        fire(
            "prior_rejects_above_quarantine_threshold",
            Decision::Quarantine,
            format!(
                "prior_reject_count {} >= {}",
                features.prior_reject_count, t.quarantine_prior_rejects_at
            ),
        );
    }

    let velocity = features
        .upload_velocity_24h
        .max(features.device_velocity_24h);
    if velocity >= t.review_velocity_24h_at {
        fire(
            "velocity_above_review_threshold",
            Decision::Review,
            format!("24h velocity {} >= {}", velocity, t.review_velocity_24h_at),
        );
    }

    if signals.assurance < t.allow_assurance_floor {
        fire(
            "assurance_below_floor",
            Decision::Review,
            format!(
                "assurance {:.3} < {:.3}",
                signals.assurance, t.allow_assurance_floor
            ),
        );
    }

    let decision = reasons
        .iter()
        .fold(Decision::Allow, |acc, r| acc.max(r.decision));
    (decision, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn profile() -> PolicyProfile {
        PolicyProfile {
            id: "default".to_string(),
            version: 1,
            thresholds: Thresholds::default(),
            risk_model_version: "risk-2024.06.1".to_string(),
            anomaly_model_version: "anomaly-2024.05.2".to_string(),
        }
    }

    fn signals(risk: f64, assurance: f64, anomaly: f64, synthetic: f64) -> Signals {
        Signals {
            risk,
            assurance,
            anomaly,
            synthetic_likelihood: synthetic,
            risk_model_version: "risk-2024.06.1".to_string(),
            anomaly_model_version: "anomaly-2024.05.2".to_string(),
            computed_at: DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    fn clean_features() -> Features {
        Features {
            account_age_days: 100,
            upload_velocity_24h: 2,
            device_velocity_24h: 1,
            prior_quarantine_count: 0,
            prior_reject_count: 0,
        }
    }

    #[test]
    fn test_clean_upload_allows_with_no_reasons() {
        let (decision, reasons) = evaluate(&profile(), &clean_features(), &signals(0.1, 0.9, 0.1, 0.1));
        assert_eq!(decision, Decision::Allow);
        assert!(reasons.is_empty());
    }

    #[test]
    fn test_high_risk_rejects() {
        let (decision, reasons) = evaluate(&profile(), &clean_features(), &signals(0.95, 0.9, 0.1, 0.1));
        assert_eq!(decision, Decision::Reject);
        assert_eq!(reasons[0].rule, "risk_above_reject_threshold");
    }

    #[test]
    fn test_most_severe_rule_wins() {
        // Anomaly votes REVIEW, synthetic votes QUARANTINE.
        let (decision, reasons) = evaluate(&profile(), &clean_features(), &signals(0.1, 0.9, 0.8, 0.9));
        assert_eq!(decision, Decision::Quarantine);
        assert_eq!(reasons.len(), 2);
    }

    #[test]
    fn test_prior_rejects_quarantine() {
        let mut features = clean_features();
        features.prior_reject_count = 3;
        let (decision, reasons) = evaluate(&profile(), &features, &signals(0.1, 0.9, 0.1, 0.1));
        assert_eq!(decision, Decision::Quarantine);
        assert!(reasons
            .iter()
            .any(|r| r.rule == "prior_rejects_above_quarantine_threshold"));
    }

    #[test]
    fn test_velocity_uses_max_of_account_and_device() {
        let mut features = clean_features();
        features.device_velocity_24h = 60;
        let (decision, _) = evaluate(&profile(), &features, &signals(0.1, 0.9, 0.1, 0.1));
        assert_eq!(decision, Decision::Review);
    }

    #[test]
    fn test_low_assurance_forces_review() {
        let (decision, reasons) = evaluate(&profile(), &clean_features(), &signals(0.1, 0.1, 0.1, 0.1));
        assert_eq!(decision, Decision::Review);
        assert_eq!(reasons[0].rule, "assurance_below_floor");
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let features = clean_features();
        let sig = signals(0.6, 0.5, 0.75, 0.2);
        let one = evaluate(&profile(), &features, &sig);
        let two = evaluate(&profile(), &features, &sig);
        assert_eq!(one, two);
    }

    #[test]
    fn test_rules_roundtrip_from_json() {
        let rules = serde_json::to_value(Thresholds::default()).unwrap();
        let profile =
            PolicyProfile::from_rules("default", 2, &rules, "risk-x", "anomaly-y").unwrap();
        assert_eq!(profile.version_string(), "default/2");
    }
}
