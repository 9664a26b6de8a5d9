//! Liveness and dashboard stats.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::scan::ScanState;
use crate::state::AppState;

/// Health points lost per rule whose logic does not compile.
const HEALTH_PENALTY_PER_FAILURE: u32 = 5;
const HEALTH_FLOOR: u32 = 50;

// ── Health ──────────────────────────────────────────────────────────

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub rules_loaded: usize,
    pub scan_state: ScanState,
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Server is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let rules_loaded = state.vault.read().expect("vault lock poisoned").rules().len();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        rules_loaded,
        scan_state: state.scan.state(),
    })
}

// ── Dashboard stats ─────────────────────────────────────────────────

/// Stats card payload. Alias pairs carry the same value under both names
/// the dashboard reads.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DashboardStats {
    pub records_scanned: u64,
    pub traces_analyzed: u64,
    /// Open records in the review queue.
    pub violations: usize,
    /// Flagged records across all scans.
    pub violations_blocked: u64,
    pub system_health: u32,
    pub health: u32,
    pub avg_latency_ms: f64,
    /// Share of scans that streamed to completion, e.g. `"100.0%"`.
    pub uptime: String,
    pub uptime_secs: u64,
    pub active_policies: usize,
}

/// Dashboard summary counters
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    tag = "Health",
    responses((status = 200, description = "Dashboard counters", body = DashboardStats))
)]
pub async fn dashboard_stats(State(state): State<Arc<AppState>>) -> Json<DashboardStats> {
    let (rules, failures) = state.compile_rules();
    let records_scanned = state.metrics.records_scanned.load(Ordering::Relaxed);
    let health = system_health(failures.len());

    Json(DashboardStats {
        records_scanned,
        traces_analyzed: records_scanned,
        violations: state.hitl.open_count(),
        violations_blocked: state.metrics.violations_blocked.load(Ordering::Relaxed),
        system_health: health,
        health,
        avg_latency_ms: state.metrics.avg_latency_ms(),
        uptime: format!("{:.1}%", state.scan.success_ratio() * 100.0),
        uptime_secs: state.started_at.elapsed().as_secs(),
        active_policies: rules.len(),
    })
}

pub(crate) fn system_health(failed_rules: usize) -> u32 {
    let penalty = (failed_rules as u32).saturating_mul(HEALTH_PENALTY_PER_FAILURE);
    100u32.saturating_sub(penalty).max(HEALTH_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_drops_per_failure_with_floor() {
        assert_eq!(system_health(0), 100);
        assert_eq!(system_health(2), 90);
        assert_eq!(system_health(10), 50);
        assert_eq!(system_health(50), 50);
    }
}
