//! Sliding window over recent transfers, for velocity (smurfing) checks.

use std::collections::VecDeque;

use chrono::{Duration, NaiveDateTime};
use lexinel_core::Transaction;

#[derive(Debug, Clone)]
struct Entry {
    from: String,
    to: String,
    at: NaiveDateTime,
}

/// Recent `(origin account, beneficiary, time)` tuples.
///
/// Entries older than the window, measured back from the newest record seen,
/// are evicted as new records arrive.
#[derive(Debug, Clone)]
pub struct VelocityWindow {
    span: Duration,
    entries: VecDeque<Entry>,
    newest: Option<NaiveDateTime>,
}

impl VelocityWindow {
    pub fn new(hours: u32) -> Self {
        Self {
            span: Duration::hours(i64::from(hours)),
            entries: VecDeque::new(),
            newest: None,
        }
    }

    /// Add a transaction to the window.
    pub fn record(&mut self, tx: &Transaction) {
        let newest = match self.newest {
            Some(prev) if prev >= tx.timestamp => prev,
            _ => tx.timestamp,
        };
        self.newest = Some(newest);
        self.entries.push_back(Entry {
            from: tx.from_account.clone(),
            to: tx.to_account.clone(),
            at: tx.timestamp,
        });
        self.evict(newest - self.span);
    }

    /// Transfers from `tx`'s origin account to its beneficiary within the
    /// window ending at `tx`. Includes `tx` itself once it has been recorded.
    pub fn same_beneficiary(&self, tx: &Transaction) -> u32 {
        let since = tx.timestamp - self.span;
        let count = self
            .entries
            .iter()
            .filter(|e| e.from == tx.from_account && e.to == tx.to_account)
            .filter(|e| e.at >= since && e.at <= tx.timestamp)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&mut self, cutoff: NaiveDateTime) {
        self.entries.retain(|e| e.at >= cutoff);
    }
}

impl Default for VelocityWindow {
    fn default() -> Self {
        Self::new(24)
    }
}
