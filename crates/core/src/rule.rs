use std::fmt;

use serde::{Deserialize, Serialize};

use crate::verdict::Severity;

/// Lifecycle state of a compliance rule. Only deployed rules are enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleStatus {
    #[default]
    Deployed,
    Pending,
    Deprecated,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleStatus::Deployed => f.write_str("DEPLOYED"),
            RuleStatus::Pending => f.write_str("PENDING"),
            RuleStatus::Deprecated => f.write_str("DEPRECATED"),
        }
    }
}

fn default_version() -> String {
    "v1.0".to_string()
}

fn default_severity() -> Severity {
    Severity::High
}

/// A compliance rule synthesized from a regulatory clause.
///
/// `logic` is a boolean expression over transaction fields, e.g.
/// `amount > 10000 AND type IN (TRANSFER, WIRE)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub clause: String,
    pub logic: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub status: RuleStatus,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default, alias = "hitRate", skip_serializing_if = "Option::is_none")]
    pub hit_rate: Option<String>,
    /// Source policy document the clause was taken from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

impl Rule {
    pub fn new(id: &str, clause: &str, logic: &str, label: &str, severity: Severity) -> Self {
        Self {
            id: id.to_string(),
            clause: clause.to_string(),
            logic: logic.to_string(),
            label: label.to_string(),
            status: RuleStatus::Deployed,
            version: default_version(),
            severity,
            hit_rate: None,
            policy: None,
        }
    }

    pub fn with_status(mut self, status: RuleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_policy(mut self, policy: &str) -> Self {
        self.policy = Some(policy.to_string());
        self
    }

    /// Read a rule from a dashboard record. Records flagged `active: false`
    /// are held as pending instead of being enforced.
    pub fn from_record(record: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut rule: Rule = serde_json::from_value(record.clone())?;
        let inactive = record.get("active").and_then(|v| v.as_bool()) == Some(false);
        if inactive && rule.status == RuleStatus::Deployed {
            rule.status = RuleStatus::Pending;
        }
        Ok(rule)
    }

    pub fn is_deployed(&self) -> bool {
        self.status == RuleStatus::Deployed
    }

    /// Label to show for a detection, falling back to the rule id.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() { &self.id } else { &self.label }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_rule_gets_defaults() {
        let rule: Rule = serde_json::from_str(r#"{"id": "R1", "logic": "amount > 1"}"#).unwrap();
        assert_eq!(rule.status, RuleStatus::Deployed);
        assert_eq!(rule.version, "v1.0");
        assert_eq!(rule.severity, Severity::High);
        assert_eq!(rule.display_label(), "R1");
    }

    #[test]
    fn accepts_camel_case_hit_rate() {
        let rule: Rule = serde_json::from_str(
            r#"{"id": "R1", "logic": "amount > 1", "label": "x", "status": "PENDING", "hitRate": "94%"}"#,
        )
        .unwrap();
        assert_eq!(rule.hit_rate.as_deref(), Some("94%"));
        assert!(!rule.is_deployed());
    }

    #[test]
    fn inactive_records_are_held_pending() {
        let record = serde_json::json!({
            "id": "AML-R04",
            "clause": "GDPR Art. 5",
            "logic": "PII fields unencrypted = true",
            "label": "PII Exposure",
            "active": false,
        });
        let rule = Rule::from_record(&record).unwrap();
        assert_eq!(rule.status, RuleStatus::Pending);

        let active = serde_json::json!({"id": "AML-R01", "logic": "amount > 1", "active": true});
        assert!(Rule::from_record(&active).unwrap().is_deployed());

        let retired = serde_json::json!({"id": "AML-R06", "logic": "amount > 1", "status": "DEPRECATED", "active": false});
        assert_eq!(Rule::from_record(&retired).unwrap().status, RuleStatus::Deprecated);
    }
}
