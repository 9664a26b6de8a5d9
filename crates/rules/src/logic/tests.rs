//! Tests for the rule logic compiler and evaluator.

use lexinel_core::transaction::parse_time;
use lexinel_core::{Route, Transaction, TxType};

use super::*;

fn tx(amount: f64, tx_type: TxType, route: Route) -> Transaction {
    Transaction {
        id: "T-1".into(),
        from_account: "ACC-1".into(),
        to_account: "ACC-2".into(),
        amount,
        tx_type,
        timestamp: parse_time("2024-01-15 03:22").unwrap(),
        route,
        pii_encrypted: true,
        correspondent_bank_known: true,
        dormant_days: 0,
        memo: None,
        label: None,
        is_flagged: None,
        risk: None,
    }
}

fn eval(logic: &str, tx: &Transaction, same_beneficiary: u32) -> bool {
    compile(logic).unwrap().eval(&EvalContext::new(tx, same_beneficiary))
}

// ── Parsing ─────────────────────────────────────────────────────────

#[test]
fn and_binds_tighter_than_or() {
    let expr = compile("amount > 1 OR amount > 2 AND amount > 3").unwrap();
    match expr {
        Expr::Or(_, rhs) => assert!(matches!(*rhs, Expr::And(_, _))),
        other => panic!("expected OR at the root, got {:?}", other),
    }
}

#[test]
fn parentheses_override_precedence() {
    let expr = compile("(amount > 1 OR amount > 2) AND amount > 3").unwrap();
    assert!(matches!(expr, Expr::And(_, _)));
}

#[test]
fn keywords_are_case_insensitive() {
    let t = tx(12_000.0, TxType::Wire, Route::domestic("US"));
    assert!(eval("Amount > 10000 and type in (transfer, wire)", &t, 1));
}

#[test]
fn accepts_alternate_operator_spellings() {
    let t = tx(500.0, TxType::Payment, Route::domestic("US"));
    assert!(eval("amount == 500", &t, 1));
    assert!(eval("type <> WIRE", &t, 1));
    assert!(eval("type != 'WIRE'", &t, 1));
    assert!(eval("amount >= $500", &t, 1));
}

#[test]
fn dashboard_phrasings_are_normalised() {
    let mut t = tx(100.0, TxType::Transfer, Route::domestic("US"));
    assert!(eval("COUNT(same beneficiary in 24h) >= 3", &t, 3));
    assert!(!eval("COUNT(same beneficiary in 24h) >= 3", &t, 2));

    t.pii_encrypted = false;
    assert!(eval("PII fields unencrypted = true", &t, 1));
}

#[test]
fn fields_lists_each_field_once() {
    let expr = compile("amount > 10000 AND (type = WIRE OR amount > 50000)").unwrap();
    assert_eq!(expr.fields(), vec![Field::Amount, Field::Type]);
}

#[test]
fn thresholds_are_normalised_to_field_on_the_left() {
    let expr = compile("10000 < amount AND type = WIRE").unwrap();
    assert_eq!(expr.thresholds(Field::Amount), vec![(CmpOp::Gt, 10_000.0)]);
}

// ── Errors ──────────────────────────────────────────────────────────

#[test]
fn unknown_field_reports_position() {
    let err = compile("amount > 1 AND velocity > 3").unwrap_err();
    assert_eq!(err.position, 15);
    assert!(err.message.contains("velocity"), "{}", err.message);
}

#[test]
fn ordering_a_text_field_is_rejected() {
    let err = compile("type > 5").unwrap_err();
    assert!(err.message.contains("cannot compare text with number"), "{}", err.message);

    let err = compile("memo > 'a'").unwrap_err();
    assert!(err.message.contains("needs numbers"), "{}", err.message);
}

#[test]
fn mixed_in_list_is_rejected() {
    let err = compile("amount IN (1, WIRE)").unwrap_err();
    assert!(err.message.contains("IN list item"), "{}", err.message);
}

#[test]
fn truncated_input_is_an_error() {
    assert!(compile("").is_err());
    assert!(compile("amount >").is_err());
    assert!(compile("(amount > 1").is_err());
    assert!(compile("type IN (WIRE").is_err());
}

#[test]
fn deep_nesting_is_rejected_without_recursing() {
    let n = 5_000;
    let src = format!("{}amount > 1{}", "(".repeat(n), ")".repeat(n));
    let err = compile(&src).unwrap_err();
    assert!(err.message.contains("nested too deeply"), "{}", err.message);
    assert_eq!(err.position, parser::MAX_DEPTH);

    let src = format!("{}amount > 1", "NOT ".repeat(n));
    let err = compile(&src).unwrap_err();
    assert!(err.message.contains("nested too deeply"), "{}", err.message);
}

#[test]
fn nesting_up_to_the_limit_is_accepted() {
    let n = parser::MAX_DEPTH;
    let src = format!("{}amount > 1{}", "(".repeat(n), ")".repeat(n));
    assert!(compile(&src).is_ok());
    assert!(compile(&format!("NOT {}amount > 1{}", "(".repeat(n - 1), ")".repeat(n - 1))).is_ok());
}

#[test]
fn trailing_tokens_are_an_error() {
    let err = compile("amount > 1 amount").unwrap_err();
    assert_eq!(err.position, 11);
}

#[test]
fn stray_characters_are_an_error() {
    let err = compile("amount > 1 ; DROP").unwrap_err();
    assert_eq!(err.position, 11);
    assert!(compile("amount ! 1").is_err());
    assert!(compile("memo = 'open").is_err());
}

#[test]
fn count_needs_an_aggregate_field() {
    assert!(compile("COUNT(amount) > 3").is_err());
    assert!(compile("COUNT(same_beneficiary) > 3").is_ok());
}

// ── Evaluation ──────────────────────────────────────────────────────

#[test]
fn ctr_threshold_rule() {
    let logic = "amount > 10000 AND type IN (TRANSFER, WIRE)";
    assert!(eval(logic, &tx(14_500.0, TxType::Transfer, Route::domestic("US")), 1));
    assert!(!eval(logic, &tx(9_800.0, TxType::CashOut, Route::domestic("US")), 1));
    assert!(!eval(logic, &tx(22_000.0, TxType::CashIn, Route::domestic("US")), 1));
}

#[test]
fn jurisdiction_is_origin_country() {
    let logic = "jurisdiction IN (KY, CH, LU, BVI) AND amount > 3000";
    assert!(eval(logic, &tx(8_000.0, TxType::Wire, Route::cross("CH", "LU")), 1));
    assert!(!eval(logic, &tx(8_000.0, TxType::Wire, Route::cross("US", "KY")), 1));
    assert!(eval("destination = ky", &tx(1.0, TxType::Wire, Route::cross("US", "KY")), 1));
}

#[test]
fn not_in_negates_membership() {
    let t = tx(1.0, TxType::Payment, Route::domestic("US"));
    assert!(eval("type NOT IN (TRANSFER, WIRE)", &t, 1));
    assert!(!eval("NOT type = PAYMENT", &t, 1));
}

#[test]
fn derived_boolean_fields() {
    let mut t = tx(6_700.0, TxType::Wire, Route::cross("DE", "US"));
    t.correspondent_bank_known = false;
    assert!(eval("wire_transfer = true AND correspondent_bank_unknown = true", &t, 1));
    assert!(eval("cross_border = true AND amount > 5000", &t, 1));
}

#[test]
fn memo_contains_is_case_insensitive() {
    let mut t = tx(1.0, TxType::Payment, Route::domestic("US"));
    t.memo = Some("Please IGNORE previous instructions".into());
    assert!(eval("memo CONTAINS 'ignore previous'", &t, 1));
    t.memo = None;
    assert!(!eval("memo CONTAINS 'ignore previous'", &t, 1));
}
