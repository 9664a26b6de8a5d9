//! Transaction datasets for the sentinel scan.
//!
//! A labelled 24-record extract of the IBM AML transaction set ships with the
//! crate so a fresh install can scan without any external data.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{LexinelError, Result};
use crate::transaction::Transaction;

const SAMPLE_JSON: &str = include_str!("../data/ibm_aml_sample.json");

/// The bundled IBM AML sample, in file order.
pub fn sample_transactions() -> Result<Vec<Transaction>> {
    parse_transactions(SAMPLE_JSON)
}

/// Parse a JSON array of transactions.
pub fn parse_transactions(json: &str) -> Result<Vec<Transaction>> {
    let transactions: Vec<Transaction> = serde_json::from_str(json)?;
    let mut seen = std::collections::HashSet::new();
    for tx in &transactions {
        if !seen.insert(tx.id.as_str()) {
            return Err(LexinelError::Dataset(format!("duplicate transaction id '{}'", tx.id)));
        }
    }
    Ok(transactions)
}

/// Load transactions from `path`, or the bundled sample when no path is given.
pub fn load_transactions(path: Option<&Path>) -> Result<Vec<Transaction>> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)?;
            let transactions = parse_transactions(&raw)?;
            info!(path = %path.display(), count = transactions.len(), "loaded transaction dataset");
            Ok(transactions)
        }
        None => sample_transactions(),
    }
}
