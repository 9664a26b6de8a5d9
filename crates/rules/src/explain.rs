//! Investigator dossier: why a record was flagged and what would clear it.

use lexinel_core::{Detection, ScanResult, Transaction};
use serde::Serialize;

use crate::engine::{CompiledRule, RuleSet};
use crate::logic::{CmpOp, Field};

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct Dossier {
    pub transaction_id: String,
    pub rule: Option<Detection>,
    pub detections: Vec<Detection>,
    pub risk_score: u8,
    pub explanation: String,
    pub counterfactual: Option<String>,
}

/// Build the dossier for one evaluated record.
///
/// The narrative follows the most severe detection: velocity rules get the
/// structuring text, jurisdiction rules the cross-border text, amount
/// thresholds the reporting text, and anything else a generic moderate-risk
/// note.
pub fn explain(tx: &Transaction, result: &ScanResult, rules: &RuleSet, window_hours: u32) -> Dossier {
    let primary = result.primary_detection().cloned();
    let compiled = primary.as_ref().and_then(|d| rules.get(&d.rule_id));

    let (explanation, counterfactual) = match (&primary, compiled) {
        (None, _) => ("No deployed rule matched this transaction.".to_string(), None),
        (Some(d), Some(rule)) => narrate(tx, result, d, rule, window_hours),
        (Some(d), None) => (
            format!(
                "Flagged by {} ({}), which is no longer in the active rule set.",
                d.rule_id, d.clause
            ),
            None,
        ),
    };

    Dossier {
        transaction_id: tx.id.clone(),
        rule: primary,
        detections: result.detections.clone(),
        risk_score: result.risk_score,
        explanation,
        counterfactual,
    }
}

fn narrate(
    tx: &Transaction,
    result: &ScanResult,
    primary: &Detection,
    rule: &CompiledRule,
    window_hours: u32,
) -> (String, Option<String>) {
    let fields = rule.expr.fields();
    let others: Vec<&str> = result
        .detections
        .iter()
        .filter(|d| d.rule_id != primary.rule_id)
        .map(|d| d.rule_id.as_str())
        .collect();
    let still_applies = if others.is_empty() {
        String::new()
    } else {
        format!(" However, {} would still apply.", others.join(", "))
    };

    if fields.contains(&Field::SameBeneficiary) {
        let count = lower_bound(rule, Field::SameBeneficiary).unwrap_or(3.0);
        let explanation = format!(
            "Account {} has executed {}+ transfers to the same beneficiary ({}) within a {}-hour window, \
             each below the reporting threshold. This matches the structuring pattern defined in {}, \
             a classic smurfing evasion technique.",
            tx.from_account, count, tx.to_account, window_hours, primary.clause
        );
        let counterfactual = format!(
            "If the transfer count from {} to {} were below {} in {}h, this pattern would not trigger {}.{}",
            tx.from_account, tx.to_account, count, window_hours, primary.rule_id, still_applies
        );
        return (explanation, Some(counterfactual));
    }

    let jurisdictional = [Field::CrossBorder, Field::Jurisdiction, Field::Origin, Field::Destination];
    if fields.iter().any(|f| jurisdictional.contains(f)) {
        let explanation = format!(
            "Transfer of ${} routed {} triggers {} ({}).",
            format_usd(tx.amount),
            tx.route,
            primary.rule_id,
            primary.clause
        );
        let counterfactual = format!(
            "If the transfer stayed within {}, {} would not apply.{}",
            tx.route.destination, primary.rule_id, still_applies
        );
        return (explanation, Some(counterfactual));
    }

    if let Some(threshold) = lower_bound(rule, Field::Amount).filter(|t| tx.amount > *t) {
        let explanation = format!(
            "This transaction was flagged because the amount of ${} exceeds the ${} threshold defined in {}.",
            format_usd(tx.amount),
            format_usd(threshold),
            primary.clause
        );
        let reduce_by = tx.amount - (threshold - 1.0).max(0.0);
        let counterfactual = format!(
            "If the amount were reduced by ${}, this record would not trigger {}.{}",
            format_usd(reduce_by),
            primary.rule_id,
            still_applies
        );
        return (explanation, Some(counterfactual));
    }

    (
        "Transaction shows moderate risk indicators. Amount is near the reporting threshold.".to_string(),
        Some(
            "Reducing transfer frequency or amount would lower the risk score below the reporting threshold."
                .to_string(),
        ),
    )
}

/// The smallest value of `field` the rule treats as suspicious, from
/// `field > n` or `field >= n` comparisons.
fn lower_bound(rule: &CompiledRule, field: Field) -> Option<f64> {
    rule.expr
        .thresholds(field)
        .into_iter()
        .filter_map(|(op, n)| match op {
            CmpOp::Gt | CmpOp::Ge => Some(n),
            _ => None,
        })
        .reduce(f64::min)
}

/// Dollar amount with thousands separators and no trailing `.00`,
/// e.g. `14,500` or `2,500.50`.
pub fn format_usd(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    match cents % 100 {
        0 => format!("{}{}", sign, grouped),
        frac => format!("{}{}.{:02}", sign, grouped, frac),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexinel_core::dataset::sample_transactions;

    use crate::vault::default_rules;

    fn dossier_for(id: &str) -> Dossier {
        let txs = sample_transactions().unwrap();
        let (rules, _) = RuleSet::compile(&default_rules());
        let results = rules.scan(&txs, 24);
        let idx = txs.iter().position(|t| t.id == id).unwrap();
        explain(&txs[idx], &results[idx], &rules, 24)
    }

    #[test]
    fn amount_threshold_counterfactual() {
        let d = dossier_for("TXN-8821");
        assert_eq!(d.rule.as_ref().unwrap().rule_id, "AML-R01");
        assert!(d.explanation.contains("$14,500 exceeds the $10,000 threshold defined in BSA §1010.310"));
        assert_eq!(
            d.counterfactual.as_deref(),
            Some("If the amount were reduced by $4,501, this record would not trigger AML-R01. However, AML-R03 would still apply.")
        );
    }

    #[test]
    fn smurfing_narrative() {
        let d = dossier_for("TXN-9910");
        assert!(d.explanation.starts_with("Account ACC-6601 has executed 3+ transfers"));
        assert!(d.counterfactual.unwrap().contains("were below 3 in 24h"));
    }

    #[test]
    fn cross_border_narrative() {
        let d = dossier_for("TXN-5530");
        assert!(d.explanation.contains("routed DE→US triggers AML-R03"), "{}", d.explanation);
        assert!(d.counterfactual.unwrap().starts_with("If the transfer stayed within US"));
    }

    #[test]
    fn compliant_record_has_no_counterfactual() {
        let d = dossier_for("TXN-4432");
        assert!(d.rule.is_none());
        assert!(d.counterfactual.is_none());
    }

    #[test]
    fn formats_dollars() {
        assert_eq!(format_usd(199_500.0), "199,500");
        assert_eq!(format_usd(999.0), "999");
        assert_eq!(format_usd(1_234_567.5), "1,234,567.50");
    }
}
