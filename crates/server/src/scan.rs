//! Sentinel scan runner.
//!
//! One scan at a time. `try_begin` moves the runner from idle (or a previous
//! completed run) to scanning and hands back a [`ScanGuard`]; dropping the
//! guard always moves it to complete, so a client that disconnects mid-stream
//! cannot leave the runner stuck.

use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use lexinel_rules::{RuleSet, VelocityWindow};

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Scanning,
    Complete,
}

#[derive(Debug, thiserror::Error)]
#[error("a sentinel scan is already running")]
pub struct ScanAlreadyRunning;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ScanStatus {
    pub state: ScanState,
    /// Run number, starting at 1. Zero before the first scan.
    pub run: u64,
    pub scanned: usize,
    pub flagged: usize,
    pub total: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

struct RunnerState {
    status: ScanStatus,
    completed_runs: u64,
    aborted_runs: u64,
}

pub struct ScanRunner {
    inner: Mutex<RunnerState>,
}

impl Default for ScanRunner {
    fn default() -> Self {
        Self {
            inner: Mutex::new(RunnerState {
                status: ScanStatus {
                    state: ScanState::Idle,
                    run: 0,
                    scanned: 0,
                    flagged: 0,
                    total: 0,
                    started_at: None,
                    finished_at: None,
                },
                completed_runs: 0,
                aborted_runs: 0,
            }),
        }
    }
}

impl ScanRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run over `total` records, or fail if one is in progress.
    pub fn try_begin(self: &Arc<Self>, total: usize) -> Result<ScanGuard, ScanAlreadyRunning> {
        let mut inner = self.inner.lock().expect("scan runner lock poisoned");
        if inner.status.state == ScanState::Scanning {
            return Err(ScanAlreadyRunning);
        }
        let run = inner.status.run + 1;
        inner.status = ScanStatus {
            state: ScanState::Scanning,
            run,
            scanned: 0,
            flagged: 0,
            total,
            started_at: Some(Utc::now()),
            finished_at: None,
        };
        info!(run, total, "sentinel scan started");
        Ok(ScanGuard {
            runner: Arc::clone(self),
            finished: false,
        })
    }

    pub fn state(&self) -> ScanState {
        self.inner.lock().expect("scan runner lock poisoned").status.state
    }

    pub fn status(&self) -> ScanStatus {
        self.inner.lock().expect("scan runner lock poisoned").status.clone()
    }

    /// Fraction of finished runs that streamed every record. 1.0 before any run.
    pub fn success_ratio(&self) -> f64 {
        let inner = self.inner.lock().expect("scan runner lock poisoned");
        let finished = inner.completed_runs + inner.aborted_runs;
        if finished == 0 {
            1.0
        } else {
            inner.completed_runs as f64 / finished as f64
        }
    }
}

/// Held for the duration of one run.
pub struct ScanGuard {
    runner: Arc<ScanRunner>,
    finished: bool,
}

impl ScanGuard {
    pub fn record(&self, flagged: bool) {
        let mut inner = self.runner.inner.lock().expect("scan runner lock poisoned");
        inner.status.scanned += 1;
        if flagged {
            inner.status.flagged += 1;
        }
    }

    /// Mark the run as having streamed every record.
    pub fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        let mut inner = self.runner.inner.lock().expect("scan runner lock poisoned");
        inner.status.state = ScanState::Complete;
        inner.status.finished_at = Some(Utc::now());
        let (run, scanned, total) = (inner.status.run, inner.status.scanned, inner.status.total);
        if self.finished {
            inner.completed_runs += 1;
            info!(run, scanned, flagged = inner.status.flagged, "sentinel scan complete");
        } else {
            inner.aborted_runs += 1;
            warn!(run, scanned, total, "sentinel scan ended early (client disconnected)");
        }
    }
}

// ── Streaming run ───────────────────────────────────────────────────

/// Evaluate the dataset in order, sending one SSE event per record. Each
/// delivered event updates counters, rule stats, the HITL queue and the live
/// feed. Returns when the dataset is exhausted or the receiver is gone;
/// dropping `tx` closes the stream.
pub async fn run_scan(
    state: Arc<AppState>,
    guard: ScanGuard,
    rules: RuleSet,
    tx: mpsc::Sender<Result<Event, Infallible>>,
) {
    let delay = Duration::from_millis(state.config.scan.event_delay_ms);
    let mut window = VelocityWindow::new(state.config.scan.velocity_window_hours);

    for (i, record) in state.transactions.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let started = Instant::now();
        window.record(record);
        let result = rules.evaluate(record, &window);
        let elapsed_us = started.elapsed().as_micros() as u64;

        let data = match serde_json::to_string(&result) {
            Ok(data) => data,
            Err(e) => {
                warn!(transaction = %record.id, error = %e, "failed to serialize scan result");
                continue;
            }
        };
        if tx.send(Ok(Event::default().data(data))).await.is_err() {
            debug!(transaction = %record.id, "scan stream receiver dropped");
            return;
        }

        let flagged = result.verdict.is_flagged();
        state.metrics.records_scanned.fetch_add(1, Ordering::Relaxed);
        state.metrics.latency_us_total.fetch_add(elapsed_us, Ordering::Relaxed);
        if flagged {
            state.metrics.violations_blocked.fetch_add(1, Ordering::Relaxed);
        }
        state.rule_stats.write().expect("rule stats lock poisoned").record(&result);
        state.hitl.enqueue(&result);
        state.feed.push_scan(&result);
        guard.record(flagged);
    }

    guard.finish();
}
