//! Tests for rule evaluation against the bundled dataset.

use lexinel_core::dataset::sample_transactions;
use lexinel_core::transaction::parse_time;
use lexinel_core::{Detection, Rule, RuleStatus, ScanResult, Severity, Transaction, Verdict};

use super::*;
use crate::vault::default_rules;

fn default_set() -> RuleSet {
    let (set, failures) = RuleSet::compile(&default_rules());
    assert!(failures.is_empty());
    set
}

fn scan_sample() -> Vec<ScanResult> {
    let txs = sample_transactions().unwrap();
    default_set().scan(&txs, 24)
}

fn result_for<'a>(results: &'a [ScanResult], id: &str) -> &'a ScanResult {
    results
        .iter()
        .find(|r| r.transaction_id == id)
        .unwrap_or_else(|| panic!("no result for {}", id))
}

fn rule_ids(result: &ScanResult) -> Vec<&str> {
    result.detections.iter().map(|d| d.rule_id.as_str()).collect()
}

fn transfer(id: &str, from: &str, to: &str, time: &str) -> Transaction {
    let mut tx = sample_transactions().unwrap().remove(6);
    tx.id = id.into();
    tx.from_account = from.into();
    tx.to_account = to.into();
    tx.timestamp = parse_time(time).unwrap();
    tx
}

// ── Compilation ─────────────────────────────────────────────────────

#[test]
fn only_deployed_rules_are_compiled() {
    let set = default_set();
    let ids: Vec<&str> = set.rules().iter().map(|r| r.rule.id.as_str()).collect();
    assert_eq!(ids, vec!["AML-R01", "AML-R02", "AML-R03", "AML-R05"]);
}

#[test]
fn compile_failures_are_reported_not_fatal() {
    let rules = vec![
        Rule::new("OK", "", "amount > 1", "ok", Severity::Low),
        Rule::new("BAD", "", "amount >> 1", "bad", Severity::Low),
        Rule::new("IGNORED", "", "also bad (", "pending", Severity::Low).with_status(RuleStatus::Pending),
    ];
    let (set, failures) = RuleSet::compile(&rules);
    assert_eq!(set.len(), 1);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].rule_id, "BAD");
}

// ── Dataset verdicts ────────────────────────────────────────────────

#[test]
fn ctr_threshold_flags_large_transfer() {
    let results = scan_sample();
    let r = result_for(&results, "TXN-8821");
    assert_eq!(r.verdict, Verdict::Flagged);
    assert_eq!(rule_ids(r), vec!["AML-R01", "AML-R03"]);
    assert_eq!(r.risk_score, 95);
}

#[test]
fn small_domestic_cash_out_is_compliant() {
    let results = scan_sample();
    let r = result_for(&results, "TXN-4432");
    assert_eq!(r.verdict, Verdict::Compliant);
    assert!(r.detections.is_empty());
    assert_eq!(r.risk_score, 0);
}

#[test]
fn smurfing_fires_on_third_transfer_only() {
    let results = scan_sample();
    assert_eq!(result_for(&results, "TXN-7734").verdict, Verdict::Compliant);
    assert_eq!(result_for(&results, "TXN-3320").verdict, Verdict::Compliant);
    let third = result_for(&results, "TXN-9910");
    assert_eq!(rule_ids(third), vec!["AML-R02"]);
    assert_eq!(third.risk_score, 70);
}

#[test]
fn tax_haven_wire_hits_three_rules() {
    let results = scan_sample();
    let r = result_for(&results, "TXN-8833");
    assert_eq!(rule_ids(r), vec!["AML-R01", "AML-R03", "AML-R05"]);
    assert_eq!(r.risk_score, 100);
    assert_eq!(r.severity(), Some(Severity::Critical));
}

#[test]
fn flagged_set_over_bundled_sample() {
    let results = scan_sample();
    let flagged: Vec<&str> = results
        .iter()
        .filter(|r| r.verdict.is_flagged())
        .map(|r| r.transaction_id.as_str())
        .collect();
    assert_eq!(
        flagged,
        vec![
            "TXN-8821", "TXN-6643", "TXN-9910", "TXN-8833", "TXN-7122", "TXN-1120", "TXN-0042",
            "TXN-6671", "TXN-5530",
        ]
    );
}

#[test]
fn results_carry_evidence_and_time() {
    let results = scan_sample();
    let r = result_for(&results, "TXN-6643");
    assert!(r.evidence_summary.starts_with("Orig: ACC-5501, Dest: ACC-9977"));
    assert_eq!(r.timestamp, "2024-01-15 03:45");
    assert_eq!(r.amount, 22_100.0);
}

// ── Velocity window ─────────────────────────────────────────────────

#[test]
fn window_counts_same_pair_only() {
    let mut window = VelocityWindow::new(24);
    let a = transfer("A", "ACC-1", "ACC-9", "2024-01-15 01:00");
    let b = transfer("B", "ACC-1", "ACC-8", "2024-01-15 02:00");
    let c = transfer("C", "ACC-1", "ACC-9", "2024-01-15 03:00");
    for tx in [&a, &b, &c] {
        window.record(tx);
    }
    assert_eq!(window.same_beneficiary(&c), 2);
    assert_eq!(window.same_beneficiary(&b), 1);
}

#[test]
fn window_evicts_entries_older_than_span() {
    let mut window = VelocityWindow::new(24);
    window.record(&transfer("A", "ACC-1", "ACC-9", "2024-01-14 01:00"));
    window.record(&transfer("B", "ACC-1", "ACC-9", "2024-01-14 12:00"));
    let late = transfer("C", "ACC-1", "ACC-9", "2024-01-15 06:00");
    window.record(&late);
    assert_eq!(window.len(), 2);
    assert_eq!(window.same_beneficiary(&late), 2);
}

#[test]
fn spread_out_transfers_do_not_trip_smurfing() {
    let set = default_set();
    let txs = vec![
        transfer("A", "ACC-1", "ACC-9", "2024-01-13 01:00"),
        transfer("B", "ACC-1", "ACC-9", "2024-01-14 02:00"),
        transfer("C", "ACC-1", "ACC-9", "2024-01-15 03:00"),
    ];
    assert!(set.scan(&txs, 24).iter().all(|r| !r.verdict.is_flagged()));
    assert!(set.scan(&txs, 72)[2].verdict.is_flagged());
}

// ── Scoring and stats ───────────────────────────────────────────────

fn detection(severity: Severity) -> Detection {
    Detection {
        rule_id: "R".into(),
        rule_label: "r".into(),
        clause: String::new(),
        severity,
    }
}

#[test]
fn risk_score_caps_at_100() {
    assert_eq!(risk_score(&[]), 0);
    assert_eq!(risk_score(&[detection(Severity::Low)]), 10);
    assert_eq!(risk_score(&[detection(Severity::Medium), detection(Severity::Low)]), 45);
    let many: Vec<Detection> = (0..6).map(|_| detection(Severity::Critical)).collect();
    assert_eq!(risk_score(&many), 100);
}

#[test]
fn stats_track_hits_and_rate() {
    let mut stats = RuleStats::default();
    assert_eq!(stats.snapshot("AML-R01").hit_rate, "N/A");
    for r in scan_sample() {
        stats.record(&r);
    }
    assert_eq!(stats.evaluated(), 24);
    assert_eq!(stats.flagged(), 9);
    assert_eq!(stats.hits("AML-R01"), 5);
    assert_eq!(stats.snapshot("AML-R01").hit_rate, "56%");
    assert_eq!(stats.hits("AML-R04"), 0);
}
