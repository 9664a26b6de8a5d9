use std::collections::HashMap;

use lexinel_core::ScanResult;
use serde::Serialize;

/// Per-rule hit counters accumulated over scans.
#[derive(Debug, Clone, Default)]
pub struct RuleStats {
    hits: HashMap<String, u64>,
    evaluated: u64,
    flagged: u64,
}

/// Snapshot of one rule's counters.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct RuleHits {
    pub hits: u64,
    /// Share of flagged records this rule fired on, e.g. `"94%"`; `"N/A"`
    /// before anything has been flagged.
    pub hit_rate: String,
}

impl RuleStats {
    pub fn record(&mut self, result: &ScanResult) {
        self.evaluated += 1;
        if result.verdict.is_flagged() {
            self.flagged += 1;
        }
        for detection in &result.detections {
            *self.hits.entry(detection.rule_id.clone()).or_insert(0) += 1;
        }
    }

    pub fn evaluated(&self) -> u64 {
        self.evaluated
    }

    pub fn flagged(&self) -> u64 {
        self.flagged
    }

    pub fn hits(&self, rule_id: &str) -> u64 {
        self.hits.get(rule_id).copied().unwrap_or(0)
    }

    pub fn snapshot(&self, rule_id: &str) -> RuleHits {
        let hits = self.hits(rule_id);
        let hit_rate = if self.flagged == 0 {
            "N/A".to_string()
        } else {
            format!("{:.0}%", hits as f64 * 100.0 / self.flagged as f64)
        };
        RuleHits { hits, hit_rate }
    }
}
