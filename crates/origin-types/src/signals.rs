//! Upload features and model signals
//!
//! `Features` are computed from persistent history at ingest time and
//! persisted on the Upload row for replay. `Signals` are the model outputs
//! scored from those features. Both are part of the certificate's
//! inputs-hash pre-image, so their serialized field names are load-bearing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-upload features aggregated from persistent state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Features {
    /// Whole days since the account was first seen; 0 on first sighting
    pub account_age_days: i64,
    /// Uploads by this account in the preceding 24 hours
    pub upload_velocity_24h: i64,
    /// Uploads by this device in the preceding 24 hours
    pub device_velocity_24h: i64,
    /// Prior QUARANTINE decisions for this account or PVID
    pub prior_quarantine_count: i64,
    /// Prior REJECT decisions for this account or PVID
    pub prior_reject_count: i64,
}

impl Features {
    /// Features for an entity with no recorded history.
    pub fn first_sighting() -> Self {
        Self {
            account_age_days: 0,
            upload_velocity_24h: 0,
            device_velocity_24h: 0,
            prior_quarantine_count: 0,
            prior_reject_count: 0,
        }
    }
}

/// Model outputs for one upload, with the versions that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    /// Risk score in [0,1]
    pub risk: f64,
    /// Assurance score in [0,1]
    pub assurance: f64,
    /// Anomaly score in [0,1]
    pub anomaly: f64,
    /// Likelihood the content is synthetic, in [0,1]
    pub synthetic_likelihood: f64,
    /// Version of the risk model that produced `risk`/`assurance`
    pub risk_model_version: String,
    /// Version of the anomaly model that produced `anomaly`/`synthetic_likelihood`
    pub anomaly_model_version: String,
    /// When the scores were computed
    pub computed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sighting_is_zeroed() {
        let f = Features::first_sighting();
        assert_eq!(f.account_age_days, 0);
        assert_eq!(f.prior_reject_count, 0);
    }

    #[test]
    fn test_features_field_names_are_stable() {
        let v = serde_json::to_value(Features::first_sighting()).unwrap();
        let obj = v.as_object().unwrap();
        for key in [
            "account_age_days",
            "upload_velocity_24h",
            "device_velocity_24h",
            "prior_quarantine_count",
            "prior_reject_count",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
    }
}
