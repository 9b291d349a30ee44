//! The decision lattice
//!
//! Every ingest resolves to exactly one of four decisions. Severity is
//! totally ordered: REJECT > QUARANTINE > REVIEW > ALLOW. When several
//! policy rules fire, the most severe decision wins.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Binding decision for one upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Allow,
    Review,
    Quarantine,
    Reject,
}

impl Decision {
    /// Severity rank used for tie-breaking; higher wins.
    pub fn severity(&self) -> u8 {
        match self {
            Decision::Allow => 0,
            Decision::Review => 1,
            Decision::Quarantine => 2,
            Decision::Reject => 3,
        }
    }

    /// The more severe of two decisions.
    pub fn max(self, other: Decision) -> Decision {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Review => "REVIEW",
            Decision::Quarantine => "QUARANTINE",
            Decision::Reject => "REJECT",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALLOW" => Ok(Decision::Allow),
            "REVIEW" => Ok(Decision::Review),
            "QUARANTINE" => Ok(Decision::Quarantine),
            "REJECT" => Ok(Decision::Reject),
            other => Err(format!("unknown decision: {other}")),
        }
    }
}

/// A policy rule that fired, with the observed value and the threshold
/// that tripped it. Reasons are part of the certificate's outputs hash,
/// so field order and naming are stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    /// Stable rule identifier, e.g. `risk_above_reject_threshold`
    pub rule: String,
    /// Decision this rule votes for
    pub decision: Decision,
    /// Human-readable detail naming the threshold that fired
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Decision::Reject.severity() > Decision::Quarantine.severity());
        assert!(Decision::Quarantine.severity() > Decision::Review.severity());
        assert!(Decision::Review.severity() > Decision::Allow.severity());
    }

    #[test]
    fn test_max_picks_most_severe() {
        assert_eq!(Decision::Allow.max(Decision::Quarantine), Decision::Quarantine);
        assert_eq!(Decision::Reject.max(Decision::Review), Decision::Reject);
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(
            serde_json::to_string(&Decision::Quarantine).unwrap(),
            "\"QUARANTINE\""
        );
        assert_eq!("REJECT".parse::<Decision>().unwrap(), Decision::Reject);
    }
}
