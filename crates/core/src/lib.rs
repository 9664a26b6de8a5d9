//! Shared domain types for the Lexinel AML sentinel.
//!
//! Everything the rule engine, the LLM assistant and the HTTP server agree
//! on lives here: configuration, the error type, transaction records, rules,
//! scan verdicts and the human-review violation record.

pub mod config;
pub mod dataset;
pub mod error;
pub mod rule;
pub mod transaction;
pub mod verdict;
pub mod violation;

pub use config::Config;
pub use error::*;
pub use rule::{Rule, RuleStatus};
pub use transaction::{Route, Transaction, TxType};
pub use verdict::{Detection, ScanResult, Severity, Verdict};
pub use violation::{ReviewStatus, Violation};
