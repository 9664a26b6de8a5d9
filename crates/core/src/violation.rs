//! Human-in-the-loop violation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::verdict::{Detection, ScanResult, Severity, Verdict};

/// Where a flagged record sits in the human review workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    #[default]
    Pending,
    HumanReview,
    AccountFrozen,
    Resolved,
}

/// A flagged transaction awaiting (or past) human review.
///
/// Fields the dashboard sends that have no typed slot are kept verbatim in
/// `extra` and written back out on serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub verdict: Verdict,
    #[serde(default)]
    pub review_status: ReviewStatus,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_clause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_summary: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Violation {
    /// Build a pending review record from a flagged scan result.
    pub fn from_scan(result: &ScanResult) -> Self {
        let primary = result.primary_detection();
        Self {
            id: result.transaction_id.clone(),
            transaction_id: result.transaction_id.clone(),
            verdict: result.verdict,
            review_status: ReviewStatus::Pending,
            detections: result.detections.clone(),
            amount: Some(result.amount),
            risk: primary.map(|d| d.severity),
            label: primary.map(|d| d.rule_label.clone()),
            rule_id: primary.map(|d| d.rule_id.clone()),
            rule_clause: primary.map(|d| d.clause.clone()),
            evidence_summary: Some(result.evidence_summary.clone()),
            timestamp: result.timestamp.clone(),
            reviewed_at: None,
            frozen_account: None,
            frozen_at: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Whether `key` names this record, by id or by transaction id.
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.transaction_id == key
    }

    pub fn is_open(&self) -> bool {
        self.review_status != ReviewStatus::Resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_unknown_fields() {
        let raw = r#"{"id": "TXN-1", "transaction_id": "TXN-1", "risk": "HIGH", "account_id": "ACC-9"}"#;
        let v: Violation = serde_json::from_str(raw).unwrap();
        assert_eq!(v.risk, Some(Severity::High));
        assert_eq!(v.extra.get("account_id").and_then(|a| a.as_str()), Some("ACC-9"));

        let back = serde_json::to_value(&v).unwrap();
        assert_eq!(back["account_id"], "ACC-9");
        assert_eq!(back["verdict"], "FLAGGED");
        assert_eq!(back["review_status"], "PENDING");
    }

    #[test]
    fn from_scan_uses_most_severe_detection() {
        let result = ScanResult {
            transaction_id: "TXN-8833".into(),
            verdict: Verdict::Flagged,
            detections: vec![
                Detection { rule_id: "AML-R03".into(), rule_label: "Cross-Border Flag".into(), clause: "FinCEN 103.29".into(), severity: Severity::High },
                Detection { rule_id: "AML-R01".into(), rule_label: "CTR Threshold".into(), clause: "BSA §1010.310".into(), severity: Severity::Critical },
            ],
            evidence_summary: "Orig: ACC-1103, Dest: ACC-8812".into(),
            risk_score: 95,
            timestamp: "2024-01-15 05:10".into(),
            amount: 199_500.0,
        };
        let v = Violation::from_scan(&result);
        assert_eq!(v.rule_id.as_deref(), Some("AML-R01"));
        assert_eq!(v.risk, Some(Severity::Critical));
        assert!(v.matches("TXN-8833"));
        assert!(v.is_open());
    }
}
