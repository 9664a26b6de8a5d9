//! Live monitoring feed.
//!
//! A bounded, newest-first ring of enforcement events. Scan results are
//! pushed as they stream; a background ticker injects simulated traffic so
//! the monitor page never goes quiet between scans.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use lexinel_core::config::FeedConfig;
use lexinel_core::ScanResult;

const SCANNER_AGENT: &str = "IBM-AML-Scanner";
const ENGINE_AGENT: &str = "N2L-Engine";

/// Outcome shown for a feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Pass,
    Warn,
    Block,
}

impl std::str::FromStr for FeedStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" => Ok(FeedStatus::Pass),
            "warn" => Ok(FeedStatus::Warn),
            "block" => Ok(FeedStatus::Block),
            other => Err(format!("unknown feed status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FeedEntry {
    pub id: String,
    pub ts: String,
    pub agent: String,
    pub rule: String,
    pub action: String,
    pub status: FeedStatus,
    pub details: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct FeedCounts {
    pub block: usize,
    pub warn: usize,
    pub pass: usize,
    pub total: usize,
}

// ── Seed and simulation tables ───────────────────────────────────

/// (id, ts, agent, rule, action, status, details), newest first.
const SEED: &[(&str, &str, &str, &str, &str, FeedStatus, &str)] = &[
    ("T001", "19:21:44", SCANNER_AGENT, "AML-R02", "Structuring Detected", FeedStatus::Block, "ACC-8912 · $1,800×4 txns in 6h window"),
    ("T002", "19:21:02", SCANNER_AGENT, "AML-R05", "Tax-Haven Route", FeedStatus::Warn, "SWIFT: BOFIUS3N → KY · $3,400"),
    ("T003", "19:20:18", SCANNER_AGENT, "ALL", "Batch Scan", FeedStatus::Pass, "482 records clean · 0 violations"),
    ("T004", "19:19:55", SCANNER_AGENT, "AML-R01", "CTR Threshold", FeedStatus::Block, "ACC-6671 · $14,200 wire transfer"),
    ("T005", "19:19:11", ENGINE_AGENT, "SYNC", "Rule Refresh", FeedStatus::Pass, "6 rules active · synthesis OK"),
    ("T006", "19:18:44", SCANNER_AGENT, "AML-R04", "PII Exposure", FeedStatus::Warn, "ACC-3345 · SSN field unencrypted in audit log"),
    ("T007", "19:17:30", SCANNER_AGENT, "AML-R03", "Cross-Border Flag", FeedStatus::Block, "DE→US · $6,700 · no correspondent bank"),
    ("T008", "19:16:00", ENGINE_AGENT, "HEARTBEAT", "Sentinel Heartbeat", FeedStatus::Pass, "IBM AML dataset online · 8,720 records indexed"),
    ("T009", "19:15:12", SCANNER_AGENT, "AML-R05", "Tax-Haven Route", FeedStatus::Block, "ACC-1120 · CH bank · $8,000 layering pattern"),
    ("T010", "19:14:44", SCANNER_AGENT, "AML-R01", "CTR Threshold", FeedStatus::Block, "ACC-7789 · $22,000 cash deposit"),
    ("T011", "19:14:01", SCANNER_AGENT, "ALL", "Batch Scan", FeedStatus::Pass, "511 records clean · 0 violations"),
    ("T012", "19:13:20", SCANNER_AGENT, "AML-R02", "Structuring Detected", FeedStatus::Warn, "ACC-2290 · $1,900×3 txns over 4h"),
];

/// (rule, action, status, details); `XXXX` becomes a random account number.
const SIMULATED: &[(&str, &str, FeedStatus, &str)] = &[
    ("AML-R01", "CTR Threshold", FeedStatus::Block, "ACC-XXXX · $15,000+ wire detected"),
    ("AML-R03", "Cross-Border Flag", FeedStatus::Warn, "RU→US · $4,800 · high-risk jurisdiction"),
    ("ALL", "Batch Scan", FeedStatus::Pass, "398 records clean · 0 violations"),
    ("AML-R04", "PII Exposure", FeedStatus::Block, "ACC-XXXX · unencrypted PII in payload"),
    ("AML-R02", "Structuring", FeedStatus::Warn, "ACC-XXXX · $1,950×3 txns in 8h"),
];

/// First id handed out after the seed entries.
const FIRST_LIVE_ID: u32 = 101;

fn agent_for(rule: &str) -> &'static str {
    match rule {
        "ALL" | "SYNC" | "HEARTBEAT" => ENGINE_AGENT,
        _ => SCANNER_AGENT,
    }
}

fn now_ts() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

// ── LiveFeed ─────────────────────────────────────────────────────

struct Ring {
    entries: VecDeque<FeedEntry>,
    next_id: u32,
}

pub struct LiveFeed {
    ring: Mutex<Ring>,
    capacity: usize,
    paused: AtomicBool,
}

impl LiveFeed {
    /// Empty feed holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                next_id: FIRST_LIVE_ID,
            }),
            capacity: capacity.max(1),
            paused: AtomicBool::new(false),
        }
    }

    /// Feed pre-filled with the monitor page's opening entries.
    pub fn seeded(capacity: usize) -> Self {
        let feed = Self::new(capacity);
        {
            let mut ring = feed.ring.lock().expect("feed lock poisoned");
            for (id, ts, agent, rule, action, status, details) in SEED.iter().take(feed.capacity) {
                ring.entries.push_back(FeedEntry {
                    id: id.to_string(),
                    ts: ts.to_string(),
                    agent: agent.to_string(),
                    rule: rule.to_string(),
                    action: action.to_string(),
                    status: *status,
                    details: details.to_string(),
                });
            }
        }
        feed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prepend an entry, evicting the oldest once full.
    pub fn push(&self, agent: &str, rule: &str, action: &str, status: FeedStatus, details: String) -> FeedEntry {
        let mut ring = self.ring.lock().expect("feed lock poisoned");
        let entry = FeedEntry {
            id: format!("T{:03}", ring.next_id),
            ts: now_ts(),
            agent: agent.to_string(),
            rule: rule.to_string(),
            action: action.to_string(),
            status,
            details,
        };
        ring.next_id += 1;
        ring.entries.push_front(entry.clone());
        while ring.entries.len() > self.capacity {
            ring.entries.pop_back();
        }
        entry
    }

    /// Push one streamed scan result: BLOCK when flagged, PASS otherwise.
    pub fn push_scan(&self, result: &ScanResult) -> FeedEntry {
        match result.primary_detection() {
            Some(primary) => self.push(
                SCANNER_AGENT,
                &primary.rule_id,
                &primary.rule_label,
                FeedStatus::Block,
                format!("{} · {} · risk {}", result.transaction_id, result.evidence_summary, result.risk_score),
            ),
            None => self.push(
                SCANNER_AGENT,
                "ALL",
                "Record Clean",
                FeedStatus::Pass,
                format!("{} · {}", result.transaction_id, result.evidence_summary),
            ),
        }
    }

    /// Inject one simulated entry unless paused.
    pub fn tick<R: Rng>(&self, rng: &mut R) -> Option<FeedEntry> {
        if self.is_paused() {
            return None;
        }
        let (rule, action, status, details) = SIMULATED[rng.gen_range(0..SIMULATED.len())];
        let account = rng.gen_range(1000..10000).to_string();
        Some(self.push(agent_for(rule), rule, action, status, details.replace("XXXX", &account)))
    }

    /// Newest-first copy of the feed, optionally filtered by status.
    pub fn snapshot(&self, status: Option<FeedStatus>) -> Vec<FeedEntry> {
        let ring = self.ring.lock().expect("feed lock poisoned");
        ring.entries
            .iter()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().expect("feed lock poisoned").entries.len()
    }

    pub fn counts(&self) -> FeedCounts {
        let ring = self.ring.lock().expect("feed lock poisoned");
        let mut counts = FeedCounts {
            total: ring.entries.len(),
            ..FeedCounts::default()
        };
        for e in &ring.entries {
            match e.status {
                FeedStatus::Block => counts.block += 1,
                FeedStatus::Warn => counts.warn += 1,
                FeedStatus::Pass => counts.pass += 1,
            }
        }
        counts
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }
}

/// Spawn the simulated-traffic ticker. Sleeps a jittered interval between
/// ticks; paused feeds skip the injection but keep the loop alive.
pub fn spawn_ticker(feed: Arc<LiveFeed>, config: &FeedConfig) -> tokio::task::JoinHandle<()> {
    let min = config.min_interval_ms;
    let max = config.max_interval_ms.max(min);
    tokio::spawn(async move {
        info!(min_ms = min, max_ms = max, "live feed ticker started");
        let mut rng = StdRng::from_entropy();
        loop {
            let delay = if max > min { rng.gen_range(min..=max) } else { min };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if let Some(entry) = feed.tick(&mut rng) {
                debug!(id = %entry.id, rule = %entry.rule, "simulated feed entry");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexinel_core::{Detection, Severity, Verdict};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn seeded_feed_matches_monitor_page() {
        let feed = LiveFeed::seeded(60);
        assert_eq!(feed.len(), 12);
        let entries = feed.snapshot(None);
        assert_eq!(entries[0].id, "T001");
        assert_eq!(entries[11].id, "T012");
        let counts = feed.counts();
        assert_eq!((counts.block, counts.warn, counts.pass, counts.total), (5, 3, 4, 12));
    }

    #[test]
    fn never_exceeds_capacity_and_evicts_oldest() {
        let feed = LiveFeed::seeded(60);
        let mut rng = rng();
        for _ in 0..100 {
            feed.tick(&mut rng);
            assert!(feed.len() <= 60);
        }
        let entries = feed.snapshot(None);
        assert_eq!(entries.len(), 60);
        // Newest first, seeds all gone.
        assert_eq!(entries[0].id, "T200");
        assert_eq!(entries[59].id, "T141");
        assert!(entries.iter().all(|e| e.id.as_str() > "T100"));
    }

    #[test]
    fn paused_feed_ignores_ticks() {
        let feed = LiveFeed::new(60);
        let mut rng = rng();
        feed.pause();
        assert!(feed.tick(&mut rng).is_none());
        assert_eq!(feed.len(), 0);
        feed.resume();
        let entry = feed.tick(&mut rng).unwrap();
        assert_eq!(entry.id, "T101");
        assert!(!entry.details.contains("XXXX"));
    }

    #[test]
    fn simulated_agents_follow_rule() {
        let feed = LiveFeed::new(60);
        let mut rng = rng();
        for _ in 0..30 {
            let e = feed.tick(&mut rng).unwrap();
            let expected = if e.rule == "ALL" { ENGINE_AGENT } else { SCANNER_AGENT };
            assert_eq!(e.agent, expected);
        }
    }

    #[test]
    fn scan_results_block_or_pass() {
        let feed = LiveFeed::new(60);
        let flagged = ScanResult {
            transaction_id: "TXN-8821".into(),
            verdict: Verdict::Flagged,
            detections: vec![Detection {
                rule_id: "AML-R01".into(),
                rule_label: "CTR Threshold".into(),
                clause: "BSA §1010.310".into(),
                severity: Severity::Critical,
            }],
            evidence_summary: "Orig: ACC-4401, Dest: ACC-9977".into(),
            risk_score: 90,
            timestamp: "2024-01-15 03:22".into(),
            amount: 14_500.0,
        };
        let clean = ScanResult {
            transaction_id: "TXN-4432".into(),
            verdict: Verdict::Compliant,
            detections: vec![],
            risk_score: 0,
            ..flagged.clone()
        };
        assert_eq!(feed.push_scan(&flagged).status, FeedStatus::Block);
        assert_eq!(feed.push_scan(&clean).status, FeedStatus::Pass);
        assert_eq!(feed.snapshot(Some(FeedStatus::Block)).len(), 1);
        assert_eq!(feed.snapshot(Some(FeedStatus::Pass))[0].rule, "ALL");
    }

    #[test]
    fn status_filter_parses_case_insensitively() {
        assert_eq!("BLOCK".parse::<FeedStatus>(), Ok(FeedStatus::Block));
        assert!("nope".parse::<FeedStatus>().is_err());
    }
}
