//! Rule evaluation over transactions.
//!
//! A [`RuleSet`] holds the compiled form of every deployed rule. Records are
//! evaluated one at a time against a [`VelocityWindow`] that the caller feeds
//! in dataset order, so velocity rules see only the transfers that came
//! before (and including) the current one.

mod stats;
mod velocity;

#[cfg(test)]
mod tests;

use lexinel_core::{Detection, Rule, ScanResult, Transaction, Verdict};
use tracing::{debug, warn};

use crate::logic::{self, EvalContext, Expr, LogicError};

pub use stats::{RuleHits, RuleStats};
pub use velocity::VelocityWindow;

/// Risk points added per detection beyond the most severe one.
const EXTRA_DETECTION_POINTS: u8 = 5;

// ── Compiled rule ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    pub expr: Expr,
}

impl CompiledRule {
    pub fn compile(rule: &Rule) -> Result<Self, LogicError> {
        let expr = logic::compile(&rule.logic)?;
        Ok(Self {
            rule: rule.clone(),
            expr,
        })
    }

    pub fn matches(&self, tx: &Transaction, window: &VelocityWindow) -> bool {
        self.expr.eval(&EvalContext::new(tx, window.same_beneficiary(tx)))
    }

    fn detection(&self) -> Detection {
        Detection {
            rule_id: self.rule.id.clone(),
            rule_label: self.rule.display_label().to_string(),
            clause: self.rule.clause.clone(),
            severity: self.rule.severity,
        }
    }
}

/// A rule whose logic did not compile.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileFailure {
    pub rule_id: String,
    pub error: LogicError,
}

// ── Rule set ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile the deployed rules in `rules`, in order. Pending and
    /// deprecated rules are ignored; rules that fail to compile are left out
    /// of the set and reported.
    pub fn compile(rules: &[Rule]) -> (Self, Vec<CompileFailure>) {
        let mut compiled = Vec::new();
        let mut failures = Vec::new();
        for rule in rules.iter().filter(|r| r.is_deployed()) {
            match CompiledRule::compile(rule) {
                Ok(c) => compiled.push(c),
                Err(error) => {
                    warn!(rule_id = %rule.id, %error, "rule logic failed to compile");
                    failures.push(CompileFailure {
                        rule_id: rule.id.clone(),
                        error,
                    });
                }
            }
        }
        debug!(active = compiled.len(), failed = failures.len(), "rule set compiled");
        (Self { rules: compiled }, failures)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn get(&self, rule_id: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.rule.id == rule_id)
    }

    /// Evaluate every rule against `tx`. The window should already contain
    /// `tx` (see [`VelocityWindow::record`]).
    pub fn evaluate(&self, tx: &Transaction, window: &VelocityWindow) -> ScanResult {
        let detections: Vec<Detection> = self
            .rules
            .iter()
            .filter(|r| r.matches(tx, window))
            .map(CompiledRule::detection)
            .collect();

        let verdict = if detections.is_empty() {
            Verdict::Compliant
        } else {
            Verdict::Flagged
        };

        ScanResult {
            transaction_id: tx.id.clone(),
            verdict,
            risk_score: risk_score(&detections),
            detections,
            evidence_summary: tx.evidence_summary(),
            timestamp: tx.time_label(),
            amount: tx.amount,
        }
    }

    /// Evaluate a batch in order with a fresh window.
    pub fn scan(&self, transactions: &[Transaction], window_hours: u32) -> Vec<ScanResult> {
        let mut window = VelocityWindow::new(window_hours);
        transactions
            .iter()
            .map(|tx| {
                window.record(tx);
                self.evaluate(tx, &window)
            })
            .collect()
    }
}

/// Most severe detection's base score plus a few points per extra
/// detection, capped at 100. Compliant records score 0.
pub fn risk_score(detections: &[Detection]) -> u8 {
    let Some(max) = detections.iter().map(|d| d.severity.base_score()).max() else {
        return 0;
    };
    let extra = u8::try_from(detections.len() - 1).unwrap_or(u8::MAX);
    max.saturating_add(extra.saturating_mul(EXTRA_DETECTION_POINTS)).min(100)
}
