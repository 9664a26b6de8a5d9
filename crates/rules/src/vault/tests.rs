//! Tests for the rule vault.

use std::fs;

use lexinel_core::{RuleStatus, Severity};
use serde_json::json;
use tempfile::TempDir;

use super::*;

fn temp_vault_path() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("nested").join("rules.yml");
    (dir, path)
}

#[test]
fn fresh_vault_has_built_in_rules() {
    let vault = RuleVault::default();
    assert_eq!(vault.rules().len(), 6);
    assert_eq!(vault.source(), BUILT_IN_SOURCE);
    assert_eq!(vault.deployed_count(), 4);
    assert_eq!(vault.get("AML-R04").unwrap().status, RuleStatus::Pending);
    assert_eq!(vault.get("AML-R06").unwrap().status, RuleStatus::Deprecated);
    assert_eq!(vault.get("AML-R01").unwrap().severity, Severity::Critical);
}

#[test]
fn every_built_in_rule_compiles() {
    for rule in default_rules() {
        assert!(crate::logic::compile(&rule.logic).is_ok(), "{} failed to compile", rule.id);
    }
}

#[test]
fn missing_file_loads_defaults() {
    let (_dir, path) = temp_vault_path();
    let vault = RuleVault::load(&path).unwrap();
    assert_eq!(vault.rules().len(), 6);
}

#[test]
fn save_then_load_keeps_rules_and_last_deployment() {
    let (_dir, path) = temp_vault_path();
    let mut vault = RuleVault::default();
    vault.deploy(
        vec![json!({"id": "AML-R07", "logic": "dormant_days > 1000 AND amount > 25000", "label": "Dormant Reactivation"})],
        "internal-memo.pdf",
    );
    vault.save(&path).unwrap();

    let loaded = RuleVault::load(&path).unwrap();
    assert_eq!(loaded.rules().len(), 7);
    assert_eq!(loaded.source(), "internal-memo.pdf");
    assert_eq!(loaded.export().rules, vault.export().rules);
}

#[test]
fn load_rejects_duplicate_ids() {
    let (_dir, path) = temp_vault_path();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        "source: test\nrules:\n  - id: R1\n    logic: amount > 1\n  - id: R1\n    logic: amount > 2\n",
    )
    .unwrap();
    assert!(matches!(RuleVault::load(&path), Err(VaultError::Validation(_))));
}

#[test]
fn load_rejects_malformed_yaml() {
    let (_dir, path) = temp_vault_path();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "rules: [ {id: ").unwrap();
    assert!(matches!(RuleVault::load(&path), Err(VaultError::Yaml(_))));
}

#[test]
fn deploy_replaces_by_id_and_appends_new() {
    let mut vault = RuleVault::default();
    let outcome = vault.deploy(
        vec![
            json!({"id": "AML-R01", "logic": "amount > 15000", "label": "CTR Threshold", "severity": "CRITICAL"}),
            json!({"id": "AML-R09", "logic": "memo CONTAINS 'ignore previous'", "label": "Prompt Injection"}),
        ],
        "policy-update",
    );
    assert_eq!(outcome.deployed_count, 2);
    assert_eq!(outcome.skipped_count, 0);
    assert_eq!(vault.rules().len(), 7);
    assert_eq!(vault.get("AML-R01").unwrap().logic, "amount > 15000");
    assert_eq!(vault.get("AML-R09").unwrap().status, RuleStatus::Deployed);
}

#[test]
fn deploy_skips_invalid_entries_with_reasons() {
    let mut vault = RuleVault::default();
    let outcome = vault.deploy(
        vec![
            json!({"id": "", "logic": "amount > 1"}),
            json!({"id": "R1", "logic": "amount >"}),
            json!({"id": "R2", "logic": "amount > 1"}),
            json!({"id": "R2", "logic": "amount > 2"}),
            json!({"id": "R3"}),
        ],
        "batch",
    );
    assert_eq!(outcome.deployed_count, 1);
    assert_eq!(outcome.skipped_count, 4);
    let reasons: Vec<(&str, &str)> = outcome
        .skipped
        .iter()
        .map(|s| (s.id.as_str(), s.reason.as_str()))
        .collect();
    assert_eq!(reasons[0], ("", "missing rule id"));
    assert_eq!(reasons[1].0, "R1");
    assert!(reasons[1].1.starts_with("logic error"));
    assert_eq!(reasons[2], ("R2", "duplicate id in request"));
    assert_eq!(reasons[3].0, "R3");
    assert!(reasons[3].1.starts_with("invalid rule"));
    assert_eq!(vault.get("R2").unwrap().logic, "amount > 1");
}

#[test]
fn inactive_dashboard_rules_deploy_as_pending() {
    let mut vault = RuleVault::default();
    let outcome = vault.deploy(
        vec![
            json!({"id": "AML-R01", "logic": "amount > 10000 AND type IN (TRANSFER, WIRE)", "active": true}),
            json!({"id": "AML-R04", "logic": "PII fields unencrypted = true", "label": "PII Exposure", "active": false}),
        ],
        "dashboard",
    );
    assert_eq!(outcome.deployed_count, 2);
    assert_eq!(vault.get("AML-R01").unwrap().status, RuleStatus::Deployed);
    assert_eq!(vault.get("AML-R04").unwrap().status, RuleStatus::Pending);
    let (set, _) = vault.compile();
    assert!(set.rules().iter().all(|r| r.rule.id != "AML-R04"));
}

#[test]
fn export_before_deploy_lists_vault_rules() {
    let vault = RuleVault::default();
    let export = vault.export();
    assert_eq!(export.source, BUILT_IN_SOURCE);
    assert_eq!(export.rules.len(), 6);
    assert_eq!(export.rules[0]["id"], "AML-R01");
}

#[test]
fn export_echoes_exact_deploy_payload() {
    let mut vault = RuleVault::default();
    let payload = vec![
        json!({"id": "AML-R01", "clause": "BSA §1010.310", "logic": "amount > 10000", "label": "CTR", "hitRate": "94%", "custom": {"owner": "ops"}}),
        json!({"id": "", "logic": "broken"}),
    ];
    vault.deploy(payload.clone(), "BSA_policy.pdf");

    let export = vault.export();
    assert_eq!(export.source, "BSA_policy.pdf");
    assert_eq!(export.rules, payload);
}
