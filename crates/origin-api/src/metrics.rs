//! Prometheus-format metrics
//!
//! Counters only, held as atomics and rendered as text on demand. The IP
//! allowlist parse-error counter lives in origin-auth so the middleware can
//! increment it without a state handle; it is read here at render time.

use std::sync::atomic::{AtomicU64, Ordering};

use origin_auth::ip::IP_ALLOWLIST_PARSE_ERRORS;
use origin_auth::rate_limit::RATE_LIMITED_TOTAL;
use origin_types::Decision;

/// Process-lifetime counters
#[derive(Debug, Default)]
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub decisions_allow: AtomicU64,
    pub decisions_review: AtomicU64,
    pub decisions_quarantine: AtomicU64,
    pub decisions_reject: AtomicU64,
}

impl Metrics {
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decision(&self, decision: Decision) {
        let counter = match decision {
            Decision::Allow => &self.decisions_allow,
            Decision::Review => &self.decisions_review,
            Decision::Quarantine => &self.decisions_quarantine,
            Decision::Reject => &self.decisions_reject,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Render the Prometheus exposition text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# TYPE origin_requests_total counter\n");
        out.push_str(&format!(
            "origin_requests_total {}\n",
            self.requests_total.load(Ordering::Relaxed)
        ));
        out.push_str("# TYPE origin_decisions_total counter\n");
        for (decision, counter) in [
            ("ALLOW", &self.decisions_allow),
            ("REVIEW", &self.decisions_review),
            ("QUARANTINE", &self.decisions_quarantine),
            ("REJECT", &self.decisions_reject),
        ] {
            out.push_str(&format!(
                "origin_decisions_total{{decision=\"{decision}\"}} {}\n",
                counter.load(Ordering::Relaxed)
            ));
        }
        out.push_str("# TYPE origin_rate_limited_total counter\n");
        out.push_str(&format!(
            "origin_rate_limited_total {}\n",
            RATE_LIMITED_TOTAL.load(Ordering::Relaxed)
        ));
        out.push_str("# TYPE origin_ip_allowlist_parse_errors_total counter\n");
        out.push_str(&format!(
            "origin_ip_allowlist_parse_errors_total {}\n",
            IP_ALLOWLIST_PARSE_ERRORS.load(Ordering::Relaxed)
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_all_series() {
        let metrics = Metrics::default();
        metrics.record_request();
        metrics.record_decision(Decision::Quarantine);
        let text = metrics.render();
        assert!(text.contains("origin_requests_total 1"));
        assert!(text.contains("origin_decisions_total{decision=\"QUARANTINE\"} 1"));
        assert!(text.contains("origin_ip_allowlist_parse_errors_total"));
    }
}
