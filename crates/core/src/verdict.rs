use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Severity ─────────────────────────────────────────────────────────

/// Risk tier of a detection or a record. Ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Base contribution to a record's 0-100 risk score.
    pub fn base_score(&self) -> u8 {
        match self {
            Severity::Low => 10,
            Severity::Medium => 40,
            Severity::High => 70,
            Severity::Critical => 90,
        }
    }

    /// Red-team severity on a 0-10 scale.
    pub fn impact_score(&self) -> f32 {
        match self {
            Severity::Low => 3.0,
            Severity::Medium => 5.5,
            Severity::High => 7.5,
            Severity::Critical => 9.5,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

// ── Verdict ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    #[default]
    Flagged,
    Compliant,
}

impl Verdict {
    pub fn is_flagged(&self) -> bool {
        matches!(self, Verdict::Flagged)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Flagged => f.write_str("FLAGGED"),
            Verdict::Compliant => f.write_str("COMPLIANT"),
        }
    }
}

// ── Detection / scan result ─────────────────────────────────────────

/// One rule that fired for a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Detection {
    #[serde(default)]
    pub rule_id: String,
    pub rule_label: String,
    #[serde(default)]
    pub clause: String,
    pub severity: Severity,
}

/// Outcome of evaluating every deployed rule against one transaction.
///
/// This is the payload of each `data:` event on the sentinel scan stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ScanResult {
    pub transaction_id: String,
    pub verdict: Verdict,
    pub detections: Vec<Detection>,
    pub evidence_summary: String,
    /// 0 for compliant records, otherwise 10..=100.
    pub risk_score: u8,
    pub timestamp: String,
    pub amount: f64,
}

impl ScanResult {
    /// The most severe detection, which drives the record's risk tier.
    pub fn primary_detection(&self) -> Option<&Detection> {
        self.detections.iter().max_by_key(|d| d.severity)
    }

    pub fn severity(&self) -> Option<Severity> {
        self.primary_detection().map(|d| d.severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_by_risk() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
    }

    #[test]
    fn verdict_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Verdict::Flagged).unwrap(), "\"FLAGGED\"");
        assert_eq!(serde_json::to_string(&Verdict::Compliant).unwrap(), "\"COMPLIANT\"");
    }

    #[test]
    fn primary_detection_is_most_severe() {
        let result = ScanResult {
            transaction_id: "T".into(),
            verdict: Verdict::Flagged,
            detections: vec![
                Detection { rule_id: "A".into(), rule_label: "a".into(), clause: String::new(), severity: Severity::High },
                Detection { rule_id: "B".into(), rule_label: "b".into(), clause: String::new(), severity: Severity::Critical },
            ],
            evidence_summary: String::new(),
            risk_score: 95,
            timestamp: String::new(),
            amount: 1.0,
        };
        assert_eq!(result.primary_detection().unwrap().rule_id, "B");
        assert_eq!(result.severity(), Some(Severity::Critical));
    }
}
