//! Shared application state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use lexinel_core::{Config, Transaction};
use lexinel_llm::ComplianceAssistant;
use lexinel_rules::{CompileFailure, RuleSet, RuleStats, RuleVault};

use crate::feed::LiveFeed;
use crate::hitl::HitlQueue;
use crate::scan::ScanRunner;

/// Counters behind the dashboard stats card.
#[derive(Default)]
pub struct Metrics {
    pub records_scanned: AtomicU64,
    pub violations_blocked: AtomicU64,
    pub latency_us_total: AtomicU64,
}

impl Metrics {
    /// Mean per-record evaluation latency in milliseconds.
    pub fn avg_latency_ms(&self) -> f64 {
        let scanned = self.records_scanned.load(Ordering::Relaxed);
        if scanned == 0 {
            return 0.0;
        }
        let total_us = self.latency_us_total.load(Ordering::Relaxed) as f64;
        (total_us / scanned as f64 / 1000.0 * 100.0).round() / 100.0
    }
}

pub struct AppState {
    pub config: Config,
    /// Rule vault; persisted to `config.storage.rules_file` on deploy.
    pub vault: RwLock<RuleVault>,
    /// Dataset the sentinel scans, in order.
    pub transactions: Vec<Transaction>,
    pub rule_stats: RwLock<RuleStats>,
    pub metrics: Metrics,
    pub scan: Arc<ScanRunner>,
    pub hitl: HitlQueue,
    pub feed: Arc<LiveFeed>,
    pub assistant: ComplianceAssistant,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, vault: RuleVault, transactions: Vec<Transaction>, assistant: ComplianceAssistant) -> Self {
        let feed = Arc::new(LiveFeed::seeded(config.feed.capacity));
        Self {
            config,
            vault: RwLock::new(vault),
            transactions,
            rule_stats: RwLock::new(RuleStats::default()),
            metrics: Metrics::default(),
            scan: Arc::new(ScanRunner::new()),
            hitl: HitlQueue::new(),
            feed,
            assistant,
            started_at: Instant::now(),
        }
    }

    /// Compile the vault's deployed rules. The vault lock is released before
    /// this returns.
    pub fn compile_rules(&self) -> (RuleSet, Vec<CompileFailure>) {
        self.vault.read().expect("vault lock poisoned").compile()
    }
}
