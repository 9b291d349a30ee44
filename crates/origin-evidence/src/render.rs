//! Artifact rendering
//!
//! Renders are deterministic: the same document produces the same bytes in
//! every format, so artifact hashes are reproducible. The PDF artifact is a
//! self-contained single-page document; only its contract (bytes, hash,
//! content type) matters to the rest of the pipeline.

use chrono::SecondsFormat;
use serde::Serialize;

use origin_db::{DbCertificate, DbRiskSignals, DbUpload};

use crate::{EvidenceFormat, Result};

/// Everything an evidence artifact documents about one decision
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceDocument {
    pub certificate_id: String,
    pub tenant_id: String,
    pub upload_external_id: String,
    pub decision: String,
    pub decision_reasons: serde_json::Value,
    pub policy_version: String,
    pub features: serde_json::Value,
    pub signals: serde_json::Value,
    pub inputs_hash: String,
    pub outputs_hash: String,
    pub ledger_hash: String,
    pub key_id: String,
    pub alg: String,
    pub signature: String,
    pub issued_at: String,
}

impl EvidenceDocument {
    pub fn from_rows(
        certificate: &DbCertificate,
        upload: &DbUpload,
        signals: Option<&DbRiskSignals>,
    ) -> Self {
        let signals_json = signals
            .map(|s| {
                serde_json::json!({
                    "risk": s.risk,
                    "assurance": s.assurance,
                    "anomaly": s.anomaly,
                    "synthetic_likelihood": s.synthetic_likelihood,
                    "risk_model_version": s.risk_model_version,
                    "anomaly_model_version": s.anomaly_model_version,
                    "computed_at": s.computed_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                })
            })
            .unwrap_or(serde_json::Value::Null);

        Self {
            certificate_id: certificate.id.to_string(),
            tenant_id: certificate.tenant_id.to_string(),
            upload_external_id: upload.external_id.clone(),
            decision: upload.decision.clone(),
            decision_reasons: upload.decision_reasons.clone(),
            policy_version: certificate.policy_version.clone(),
            features: upload.decision_inputs_json.clone(),
            signals: signals_json,
            inputs_hash: certificate.inputs_hash.clone(),
            outputs_hash: certificate.outputs_hash.clone(),
            ledger_hash: certificate.ledger_hash.clone(),
            key_id: certificate.key_id.clone(),
            alg: certificate.alg.clone(),
            signature: certificate.signature.clone(),
            issued_at: certificate
                .issued_at
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    /// Field/value pairs for the line-oriented renders (HTML table, PDF).
    fn summary_lines(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Certificate", self.certificate_id.clone()),
            ("Upload", self.upload_external_id.clone()),
            ("Decision", self.decision.clone()),
            ("Policy version", self.policy_version.clone()),
            ("Inputs hash", self.inputs_hash.clone()),
            ("Outputs hash", self.outputs_hash.clone()),
            ("Ledger hash", self.ledger_hash.clone()),
            ("Signing key", self.key_id.clone()),
            ("Algorithm", self.alg.clone()),
            ("Issued at", self.issued_at.clone()),
        ]
    }
}

/// Render one artifact.
pub fn render_artifact(document: &EvidenceDocument, format: EvidenceFormat) -> Result<Vec<u8>> {
    match format {
        EvidenceFormat::Json => render_json(document),
        EvidenceFormat::Html => Ok(render_html(document)),
        EvidenceFormat::Pdf => Ok(render_pdf(document)),
    }
}

fn render_json(document: &EvidenceDocument) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(document)
        .map_err(|e| crate::EvidenceError::Render(format!("json: {e}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn render_html(document: &EvidenceDocument) -> Vec<u8> {
    let mut rows = String::new();
    for (label, value) in document.summary_lines() {
        rows.push_str(&format!(
            "      <tr><th>{}</th><td>{}</td></tr>\n",
            html_escape(label),
            html_escape(&value)
        ));
    }
    let reasons = document
        .decision_reasons
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|r| {
                    format!(
                        "      <li>{}</li>\n",
                        html_escape(&r.to_string())
                    )
                })
                .collect::<String>()
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>Evidence Pack {certificate_id}</title>
  </head>
  <body>
    <h1>Decision Evidence</h1>
    <table>
{rows}    </table>
    <h2>Reasons</h2>
    <ul>
{reasons}    </ul>
    <h2>Signature</h2>
    <pre>{signature}</pre>
  </body>
</html>
"#,
        certificate_id = html_escape(&document.certificate_id),
        rows = rows,
        reasons = reasons,
        signature = html_escape(&document.signature),
    )
    .into_bytes()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Minimal single-page PDF: catalog, page tree, one page, Helvetica, and a
/// text stream of the summary lines. Offsets in the xref are computed from
/// the emitted bytes, so the output is a valid, deterministic document.
fn render_pdf(document: &EvidenceDocument) -> Vec<u8> {
    let mut text = String::from("BT /F1 10 Tf 50 742 Td 14 TL\n");
    text.push_str("(ORIGIN Decision Evidence) Tj T*\n( ) Tj T*\n");
    for (label, value) in document.summary_lines() {
        text.push_str(&format!("({}: {}) Tj T*\n", pdf_escape(label), pdf_escape(&value)));
    }
    text.push_str("ET\n");

    let objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}endstream", text.len(), text),
    ];

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_offset = out.len();
    out.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    out.push_str("0000000000 65535 f \n");
    for offset in &offsets {
        out.push_str(&format!("{offset:010} 00000 n \n"));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    out.into_bytes()
}

fn pdf_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    fn document() -> EvidenceDocument {
        let issued_at: DateTime<Utc> = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        EvidenceDocument {
            certificate_id: Uuid::nil().to_string(),
            tenant_id: Uuid::nil().to_string(),
            upload_external_id: "up1".to_string(),
            decision: "ALLOW".to_string(),
            decision_reasons: serde_json::json!([]),
            policy_version: "default/1".to_string(),
            features: serde_json::json!({"account_age_days": 10}),
            signals: serde_json::json!({"risk": 0.1}),
            inputs_hash: "aa".repeat(32),
            outputs_hash: "bb".repeat(32),
            ledger_hash: "cc".repeat(32),
            key_id: "local-1234".to_string(),
            alg: "PS256".to_string(),
            signature: "c2ln".to_string(),
            issued_at: issued_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    #[test]
    fn test_renders_are_deterministic() {
        let doc = document();
        for format in [EvidenceFormat::Json, EvidenceFormat::Html, EvidenceFormat::Pdf] {
            let a = render_artifact(&doc, format).unwrap();
            let b = render_artifact(&doc, format).unwrap();
            assert_eq!(a, b, "{format} render not deterministic");
            assert!(!a.is_empty());
        }
    }

    #[test]
    fn test_json_roundtrips() {
        let bytes = render_artifact(&document(), EvidenceFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["decision"], "ALLOW");
        assert_eq!(value["alg"], "PS256");
    }

    #[test]
    fn test_html_escapes_content() {
        let mut doc = document();
        doc.upload_external_id = "<script>alert(1)</script>".to_string();
        let html = String::from_utf8(render_artifact(&doc, EvidenceFormat::Html).unwrap()).unwrap();
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_pdf_structure() {
        let bytes = render_artifact(&document(), EvidenceFormat::Pdf).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("/Type /Catalog"));
        assert!(text.contains("startxref"));
    }
}
