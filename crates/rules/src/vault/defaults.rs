//! Built-in rule set shipped with a fresh install.

use lexinel_core::{Rule, RuleStatus, Severity};

pub const BSA_POLICY: &str = "BSA / FinCEN AML Policy";
pub const FATF_POLICY: &str = "FATF 40 Recommendations";
pub const AMLD6_POLICY: &str = "EU AMLD6 Framework";

/// AML-R01..AML-R06. R04 awaits review and R06 has been superseded by R03,
/// so four rules are enforced out of the box.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "AML-R01",
            "BSA §1010.310",
            "amount > 10000 AND type IN (TRANSFER, WIRE)",
            "CTR Threshold",
            Severity::Critical,
        )
        .with_version("v3.2")
        .with_policy(BSA_POLICY),
        Rule::new(
            "AML-R02",
            "FATF Rec. 10",
            "COUNT(same_beneficiary_24h) >= 3 AND amount < 2000",
            "Structuring / Smurfing",
            Severity::High,
        )
        .with_version("v2.1")
        .with_policy(FATF_POLICY),
        Rule::new(
            "AML-R03",
            "FinCEN 103.29",
            "cross_border = true AND amount > 5000",
            "Cross-Border Flag",
            Severity::High,
        )
        .with_version("v1.8")
        .with_policy(BSA_POLICY),
        Rule::new(
            "AML-R04",
            "GDPR Art. 5",
            "pii_encrypted = false",
            "PII Exposure Guard",
            Severity::High,
        )
        .with_version("v1.0")
        .with_status(RuleStatus::Pending)
        .with_policy(AMLD6_POLICY),
        Rule::new(
            "AML-R05",
            "AMLD6 Art. 3(4)",
            "jurisdiction IN (KY, CH, LU, BVI) AND amount > 3000",
            "Tax Haven Routing",
            Severity::High,
        )
        .with_version("v2.4")
        .with_policy(AMLD6_POLICY),
        Rule::new(
            "AML-R06",
            "FATF Rec. 16",
            "wire_transfer = true AND correspondent_bank_unknown = true",
            "Correspondent Risk",
            Severity::Medium,
        )
        .with_version("v1.1")
        .with_status(RuleStatus::Deprecated)
        .with_policy(FATF_POLICY),
    ]
}
