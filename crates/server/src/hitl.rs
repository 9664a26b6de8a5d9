//! Human-in-the-loop violation queue.
//!
//! Flagged scan results land here for an analyst to review, freeze or
//! resolve. The dashboard may act on records the queue has never seen (a
//! row it flagged client-side), so review and freeze insert on a miss.

use std::sync::RwLock;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::info;

use lexinel_core::{ReviewStatus, ScanResult, Verdict, Violation};

/// Account recorded when a freeze request names none.
pub const UNKNOWN_ACCOUNT: &str = "UNKNOWN";

/// Whether an action touched an existing record or created one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAction {
    Updated,
    Inserted,
}

#[derive(Default)]
pub struct HitlQueue {
    violations: RwLock<Vec<Violation>>,
}

impl HitlQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// All queued records, oldest first.
    pub fn list(&self) -> Vec<Violation> {
        self.violations.read().expect("hitl lock poisoned").clone()
    }

    pub fn get(&self, key: &str) -> Option<Violation> {
        self.violations
            .read()
            .expect("hitl lock poisoned")
            .iter()
            .find(|v| v.matches(key))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.violations.read().expect("hitl lock poisoned").len()
    }

    pub fn open_count(&self) -> usize {
        self.violations
            .read()
            .expect("hitl lock poisoned")
            .iter()
            .filter(|v| v.is_open())
            .count()
    }

    /// Queue a flagged scan result. Compliant results and transactions
    /// already queued are ignored; returns whether a record was added.
    pub fn enqueue(&self, result: &ScanResult) -> bool {
        if !result.verdict.is_flagged() {
            return false;
        }
        let mut guard = self.violations.write().expect("hitl lock poisoned");
        if guard.iter().any(|v| v.matches(&result.transaction_id)) {
            return false;
        }
        guard.push(Violation::from_scan(result));
        true
    }

    /// Mark a record for human review, inserting it from `body` if absent.
    pub fn review(&self, id: &str, body: Map<String, Value>) -> Result<QueueAction, serde_json::Error> {
        let now = Utc::now();
        let mut guard = self.violations.write().expect("hitl lock poisoned");
        if let Some(v) = guard.iter_mut().find(|v| v.matches(id)) {
            v.review_status = ReviewStatus::HumanReview;
            v.reviewed_at = Some(now);
            info!(violation = %id, "queued for human review");
            return Ok(QueueAction::Updated);
        }

        let mut v = violation_from_body(id, body)?;
        v.review_status = ReviewStatus::HumanReview;
        v.reviewed_at = Some(now);
        guard.push(v);
        info!(violation = %id, "queued for human review (new record)");
        Ok(QueueAction::Inserted)
    }

    /// Freeze the account behind a record, inserting it from `body` if absent.
    pub fn freeze(&self, id: &str, account_id: &str, body: Map<String, Value>) -> Result<QueueAction, serde_json::Error> {
        let now = Utc::now();
        let mut guard = self.violations.write().expect("hitl lock poisoned");
        if let Some(v) = guard.iter_mut().find(|v| v.matches(id)) {
            v.review_status = ReviewStatus::AccountFrozen;
            v.frozen_account = Some(account_id.to_string());
            v.frozen_at = Some(now);
            info!(violation = %id, account = %account_id, "account frozen");
            return Ok(QueueAction::Updated);
        }

        let mut v = violation_from_body(id, body)?;
        v.review_status = ReviewStatus::AccountFrozen;
        v.frozen_account = Some(account_id.to_string());
        v.frozen_at = Some(now);
        guard.push(v);
        info!(violation = %id, account = %account_id, "account frozen (new record)");
        Ok(QueueAction::Inserted)
    }

    /// Clear a record from the queue. Returns whether one was removed.
    pub fn resolve(&self, id: &str) -> bool {
        let mut guard = self.violations.write().expect("hitl lock poisoned");
        let before = guard.len();
        guard.retain(|v| !v.matches(id));
        let removed = guard.len() < before;
        if removed {
            info!(violation = %id, "violation resolved");
        }
        removed
    }
}

/// Build a flagged record from a request body. `id` wins over any `id` in
/// the body, and `transaction_id` defaults to it.
fn violation_from_body(id: &str, mut body: Map<String, Value>) -> Result<Violation, serde_json::Error> {
    body.insert("id".into(), Value::String(id.to_string()));
    let missing_tx = body
        .get("transaction_id")
        .and_then(Value::as_str)
        .map_or(true, str::is_empty);
    if missing_tx {
        body.insert("transaction_id".into(), Value::String(id.to_string()));
    }
    // Timestamps and status are set by the caller.
    for key in ["review_status", "reviewed_at", "frozen_at", "frozen_account", "account_id"] {
        body.remove(key);
    }
    let mut v: Violation = serde_json::from_value(Value::Object(body))?;
    v.verdict = Verdict::Flagged;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexinel_core::{Detection, Severity};
    use serde_json::json;

    fn flagged(id: &str) -> ScanResult {
        ScanResult {
            transaction_id: id.into(),
            verdict: Verdict::Flagged,
            detections: vec![Detection {
                rule_id: "AML-R01".into(),
                rule_label: "CTR Threshold".into(),
                clause: "BSA §1010.310".into(),
                severity: Severity::Critical,
            }],
            evidence_summary: "Orig: ACC-4401, Dest: ACC-9977".into(),
            risk_score: 90,
            timestamp: "2024-01-15 03:22".into(),
            amount: 14_500.0,
        }
    }

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn enqueue_dedups_by_transaction() {
        let q = HitlQueue::new();
        assert!(q.enqueue(&flagged("TXN-8821")));
        assert!(!q.enqueue(&flagged("TXN-8821")));
        let mut clean = flagged("TXN-4432");
        clean.verdict = Verdict::Compliant;
        assert!(!q.enqueue(&clean));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn review_updates_existing_record() {
        let q = HitlQueue::new();
        q.enqueue(&flagged("TXN-8821"));
        let action = q.review("TXN-8821", Map::new()).unwrap();
        assert_eq!(action, QueueAction::Updated);
        let v = q.get("TXN-8821").unwrap();
        assert_eq!(v.review_status, ReviewStatus::HumanReview);
        assert!(v.reviewed_at.is_some());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn review_inserts_unknown_record_from_body() {
        let q = HitlQueue::new();
        let b = body(json!({
            "id": "ignored", "amount": 9900.0, "risk": "HIGH", "label": "Structuring",
            "rule_id": "AML-R02", "timestamp": "2024-01-15 09:10", "analyst_note": "split deposits"
        }));
        assert_eq!(q.review("TXN-7734", b).unwrap(), QueueAction::Inserted);
        let v = q.get("TXN-7734").unwrap();
        assert_eq!(v.transaction_id, "TXN-7734");
        assert_eq!(v.verdict, Verdict::Flagged);
        assert_eq!(v.risk, Some(Severity::High));
        assert_eq!(v.extra["analyst_note"], "split deposits");
    }

    #[test]
    fn freeze_sets_account_and_inserts_on_miss() {
        let q = HitlQueue::new();
        q.enqueue(&flagged("TXN-8821"));
        assert_eq!(q.freeze("TXN-8821", "ACC-4401", Map::new()).unwrap(), QueueAction::Updated);
        assert_eq!(q.get("TXN-8821").unwrap().frozen_account.as_deref(), Some("ACC-4401"));

        let b = body(json!({"transaction_id": "TXN-0042", "account_id": "ACC-1"}));
        assert_eq!(q.freeze("V-1", UNKNOWN_ACCOUNT, b).unwrap(), QueueAction::Inserted);
        let v = q.get("TXN-0042").unwrap();
        assert_eq!(v.id, "V-1");
        assert_eq!(v.review_status, ReviewStatus::AccountFrozen);
        assert_eq!(v.frozen_account.as_deref(), Some("UNKNOWN"));
        assert!(v.frozen_at.is_some());
    }

    #[test]
    fn resolve_removes_record() {
        let q = HitlQueue::new();
        q.enqueue(&flagged("TXN-8821"));
        q.enqueue(&flagged("TXN-9910"));
        assert!(q.resolve("TXN-8821"));
        assert!(!q.resolve("TXN-8821"));
        assert_eq!(q.open_count(), 1);
    }

    #[test]
    fn malformed_body_is_rejected() {
        let q = HitlQueue::new();
        let b = body(json!({"amount": "lots"}));
        assert!(q.review("TXN-1", b).is_err());
        assert_eq!(q.len(), 0);
    }
}
