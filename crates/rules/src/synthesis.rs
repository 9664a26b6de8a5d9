//! Natural-language-to-logic synthesis.
//!
//! Policy text is split into sentences and scanned for regulatory citations
//! and obligation phrases this console knows how to enforce. Each recognised
//! obligation becomes a `PENDING` rule that a reviewer can deploy. The
//! result is deterministic for a given text.

use lexinel_core::{Rule, RuleStatus, Severity};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// An obligation the synthesizer can recognise.
struct ClausePattern {
    id: &'static str,
    clause: &'static str,
    label: &'static str,
    logic: &'static str,
    severity: Severity,
    /// Lowercase phrases, any of which identifies the obligation.
    phrases: &'static [&'static str],
    /// Whether a dollar figure in the matching sentence replaces the
    /// default amount threshold.
    amount_threshold: Option<f64>,
}

const PATTERNS: &[ClausePattern] = &[
    ClausePattern {
        id: "AML-R01",
        clause: "BSA §1010.310",
        label: "CTR Threshold",
        logic: "amount > {amount} AND type IN (TRANSFER, WIRE)",
        severity: Severity::Critical,
        phrases: &["1010.310", "currency transaction report", "$10,000", "10,000"],
        amount_threshold: Some(10_000.0),
    },
    ClausePattern {
        id: "AML-R02",
        clause: "FATF Rec. 10",
        label: "Structuring / Smurfing",
        logic: "COUNT(same_beneficiary_24h) >= 3 AND amount < {amount}",
        severity: Severity::High,
        phrases: &["structuring", "smurfing", "recommendation 10", "rec. 10"],
        amount_threshold: Some(2_000.0),
    },
    ClausePattern {
        id: "AML-R03",
        clause: "FinCEN 103.29",
        label: "Cross-Border Flag",
        logic: "cross_border = true AND amount > {amount}",
        severity: Severity::High,
        phrases: &["103.29", "cross-border", "cross border", "international transfer"],
        amount_threshold: Some(5_000.0),
    },
    ClausePattern {
        id: "AML-R04",
        clause: "GDPR Art. 5",
        label: "PII Exposure Guard",
        logic: "pii_encrypted = false",
        severity: Severity::High,
        phrases: &["personal data", "gdpr", "pii", "data protection"],
        amount_threshold: None,
    },
    ClausePattern {
        id: "AML-R05",
        clause: "AMLD6 Art. 3(4)",
        label: "Tax Haven Routing",
        logic: "jurisdiction IN (KY, CH, LU, BVI) AND amount > {amount}",
        severity: Severity::High,
        phrases: &["tax haven", "offshore", "art. 3(4)", "high-risk jurisdiction"],
        amount_threshold: Some(3_000.0),
    },
    ClausePattern {
        id: "AML-R06",
        clause: "FATF Rec. 16",
        label: "Correspondent Risk",
        logic: "wire_transfer = true AND correspondent_bank_unknown = true",
        severity: Severity::Medium,
        phrases: &["correspondent", "recommendation 16", "rec. 16"],
        amount_threshold: None,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Identify,
    Convert,
    Map,
    Complete,
}

/// One line of the synthesis console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SynthesisStep {
    pub stage: Stage,
    pub message: String,
}

/// A synthesized rule with the sentence it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SynthesizedRule {
    #[serde(flatten)]
    pub rule: Rule,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SynthesisReport {
    pub source: String,
    pub steps: Vec<SynthesisStep>,
    pub rules: Vec<SynthesizedRule>,
}

impl SynthesisReport {
    pub fn push_step(&mut self, stage: Stage, message: impl Into<String>) {
        self.steps.push(SynthesisStep {
            stage,
            message: message.into(),
        });
    }
}

/// Turn policy text into pending rules.
pub fn synthesize(source: &str, text: &str) -> SynthesisReport {
    let mut report = SynthesisReport {
        source: source.to_string(),
        steps: Vec::new(),
        rules: Vec::new(),
    };

    let sentences = split_sentences(text);
    report.push_step(
        Stage::Extract,
        format!("Extracted {} characters, {} sentences from {}", text.len(), sentences.len(), source),
    );
    report.push_step(Stage::Identify, "Identifying policy clauses and obligations...");

    for pattern in PATTERNS {
        let Some(sentence) = sentences.iter().find(|s| mentions(s, pattern.phrases)) else {
            continue;
        };
        let amount = pattern
            .amount_threshold
            .map(|default| dollar_figure(sentence).unwrap_or(default));
        let logic = match amount {
            Some(a) => pattern.logic.replace("{amount}", &format_amount(a)),
            None => pattern.logic.to_string(),
        };
        debug!(rule_id = pattern.id, %logic, "clause recognised");
        report.push_step(
            Stage::Convert,
            format!("{} → {}: {}", pattern.clause, pattern.id, logic),
        );
        let rule = Rule::new(pattern.id, pattern.clause, &logic, pattern.label, pattern.severity)
            .with_status(RuleStatus::Pending)
            .with_policy(source);
        report.rules.push(SynthesizedRule {
            rule,
            excerpt: sentence.to_string(),
        });
    }

    if report.rules.is_empty() {
        report.push_step(Stage::Map, "No enforceable obligations recognised");
    } else {
        report.push_step(
            Stage::Map,
            format!("Mapped {} rules to the transaction schema", report.rules.len()),
        );
    }
    report.push_step(Stage::Complete, "N2L synthesis complete. Rules ready for review.");
    info!(source, rules = report.rules.len(), "policy synthesized");
    report
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['\n', ';'])
        .flat_map(|line| line.split(". "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn mentions(sentence: &str, phrases: &[&str]) -> bool {
    let lower = sentence.to_lowercase();
    phrases.iter().any(|p| {
        // Short acronyms must stand alone, so "pii" does not match "ppii".
        if p.len() <= 4 && p.chars().all(|c| c.is_ascii_alphabetic()) {
            lower
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|word| word == *p)
        } else {
            lower.contains(p)
        }
    })
}

/// First `$N` figure in the sentence, e.g. `$15,000` or `$2,500.50`.
fn dollar_figure(sentence: &str) -> Option<f64> {
    let start = sentence.find('$')? + 1;
    let digits: String = sentence[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();
    let digits = digits.trim_end_matches('.');
    digits.parse::<f64>().ok().filter(|v| *v > 0.0)
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{:.0}", amount)
    } else {
        format!("{}", amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic;

    const BSA_EXCERPT: &str = "Section 4. Financial institutions must file a Currency Transaction Report \
        for any cash transfer exceeding $15,000 in a single business day. \
        Institutions shall monitor for structuring of deposits below reporting thresholds.\n\
        Cross-border movements above $5,000 require enhanced review.";

    #[test]
    fn recognises_obligations_in_order() {
        let report = synthesize("BSA_policy.pdf", BSA_EXCERPT);
        let ids: Vec<&str> = report.rules.iter().map(|r| r.rule.id.as_str()).collect();
        assert_eq!(ids, vec!["AML-R01", "AML-R02", "AML-R03"]);
        assert!(report.rules.iter().all(|r| r.rule.status == RuleStatus::Pending));
        assert_eq!(report.rules[0].rule.policy.as_deref(), Some("BSA_policy.pdf"));
    }

    #[test]
    fn dollar_figure_overrides_threshold() {
        let report = synthesize("memo", BSA_EXCERPT);
        assert_eq!(report.rules[0].rule.logic, "amount > 15000 AND type IN (TRANSFER, WIRE)");
        assert_eq!(report.rules[2].rule.logic, "cross_border = true AND amount > 5000");
        // No figure in the structuring sentence, so the default stays.
        assert_eq!(report.rules[1].rule.logic, "COUNT(same_beneficiary_24h) >= 3 AND amount < 2000");
    }

    #[test]
    fn synthesized_logic_compiles() {
        let text = "GDPR personal data must be encrypted. Offshore tax haven routing is prohibited. \
            Correspondent banks must be identified. Structuring is a crime.";
        let report = synthesize("mixed", text);
        assert_eq!(report.rules.len(), 4);
        for r in &report.rules {
            assert!(logic::compile(&r.rule.logic).is_ok(), "{}", r.rule.logic);
        }
    }

    #[test]
    fn acronyms_match_whole_words_only() {
        assert!(mentions("pii must be encrypted", &["pii"]));
        assert!(!mentions("shippiing notes", &["pii"]));
    }

    #[test]
    fn unrelated_text_yields_no_rules() {
        let report = synthesize("lunch.pdf", "The cafeteria opens at nine.");
        assert!(report.rules.is_empty());
        assert_eq!(report.steps.last().unwrap().stage, Stage::Complete);
        assert!(report.steps.iter().any(|s| s.message.contains("No enforceable")));
    }

    #[test]
    fn parses_dollar_figures() {
        assert_eq!(dollar_figure("above $2,500.50 each"), Some(2500.5));
        assert_eq!(dollar_figure("above $10,000."), Some(10_000.0));
        assert_eq!(dollar_figure("no amount"), None);
    }
}
