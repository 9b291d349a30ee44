//! Request/response DTOs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use origin_evidence::{EvidenceFormat, Result as EvidenceResult};

// ============================================================================
// Evidence
// ============================================================================

/// POST /v1/evidence-packs. `format` is the documented comma-separated
/// field; `formats` is accepted as an array for convenience.
#[derive(Debug, Deserialize)]
pub struct EvidencePackRequest {
    pub certificate_id: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub formats: Option<Vec<String>>,
}

impl EvidencePackRequest {
    /// Parse the requested formats; defaults to json when neither field is set.
    pub fn parsed_formats(&self) -> EvidenceResult<Vec<EvidenceFormat>> {
        let names: Vec<String> = match (&self.format, &self.formats) {
            (Some(csv), _) => csv.split(',').map(|s| s.trim().to_string()).collect(),
            (None, Some(list)) => list.clone(),
            (None, None) => vec!["json".to_string()],
        };
        names.iter().map(|name| name.parse()).collect()
    }
}

/// 202 body for enqueue; `task_state` is a deprecated mirror of
/// `task_status` and always equals it.
#[derive(Debug, Serialize)]
pub struct EvidencePackAccepted {
    pub status: String,
    pub task_id: String,
    pub task_status: Option<String>,
    pub task_state: Option<String>,
    pub pipeline_event: String,
    pub poll_url: String,
    pub retry_after_seconds: u64,
}

/// 200 body for a ready pack
#[derive(Debug, Serialize)]
pub struct EvidencePackReady {
    pub status: String,
    pub signed_urls: BTreeMap<String, String>,
    pub artifact_hashes: BTreeMap<String, String>,
    pub artifact_sizes: BTreeMap<String, u64>,
}

// ============================================================================
// Webhooks
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct WebhookCreateRequest {
    pub url: String,
    pub events: Vec<String>,
    /// Optional; generated when omitted and returned exactly once.
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookCreated {
    pub id: String,
    pub url: String,
    pub events: Vec<String>,
    pub active: bool,
    /// Present only at creation
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookTestRequest {
    pub webhook_id: String,
}

// ============================================================================
// Admin
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TenantCreateRequest {
    pub display_name: String,
    #[serde(default)]
    pub ip_allowlist: Option<Vec<String>>,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: i32,
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: i32,
}

fn default_rate_limit_per_minute() -> i32 {
    600
}

fn default_rate_limit_burst() -> i32 {
    100
}

#[derive(Debug, Serialize)]
pub struct TenantCreated {
    pub tenant_id: String,
    pub display_name: String,
    /// Returned exactly once
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyRotated {
    pub tenant_id: String,
    /// Returned exactly once
    pub api_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_separated_formats() {
        let req = EvidencePackRequest {
            certificate_id: "c".to_string(),
            format: Some("json,pdf".to_string()),
            formats: None,
        };
        assert_eq!(
            req.parsed_formats().unwrap(),
            vec![EvidenceFormat::Json, EvidenceFormat::Pdf]
        );
    }

    #[test]
    fn test_default_format_is_json() {
        let req = EvidencePackRequest {
            certificate_id: "c".to_string(),
            format: None,
            formats: None,
        };
        assert_eq!(req.parsed_formats().unwrap(), vec![EvidenceFormat::Json]);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let req = EvidencePackRequest {
            certificate_id: "c".to_string(),
            format: Some("json,docx".to_string()),
            formats: None,
        };
        assert!(req.parsed_formats().is_err());
    }
}
