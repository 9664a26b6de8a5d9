//! Compliance rule engine.
//!
//! This crate provides:
//! - A small boolean logic language for rule conditions, compiled and
//!   type-checked up front
//! - Rule evaluation over transactions with a sliding velocity window
//! - A YAML-backed rule vault with deploy/export
//! - Deterministic policy-text-to-rule synthesis
//! - Investigator dossiers (explanation and counterfactual)
//! - Red-team attack simulation against the deployed rules

pub mod engine;
pub mod explain;
pub mod logic;
pub mod redteam;
pub mod synthesis;
pub mod vault;

pub use engine::{CompileFailure, CompiledRule, RuleHits, RuleSet, RuleStats, VelocityWindow};
pub use logic::LogicError;
pub use vault::{DeployOutcome, DeploymentExport, RuleVault, SkippedRule, VaultError};
