//! HTTP endpoint modules, one per dashboard area.

pub mod chat;
pub mod config;
pub mod doc;
pub mod health;
pub mod monitor;
pub mod policies;
pub mod redteam;
pub mod sentinel;


// ── Re-exports ───────────────────────────────────────────────────
// Flat `api::foo` paths used by router.rs.

pub use chat::chat;
pub use config::config;
pub use doc::ApiDoc;
pub use health::{dashboard_stats, health};
pub use monitor::{feed, pause, resume};
pub use policies::{deploy_rules, export_rules, list_rules, synthesize, validate_logic};
pub use redteam::{attack, list_scenarios};
pub use sentinel::{
    freeze, generate_sar, list_violations, resolve, review, scan_status, scan_stream,
    violation_dossier,
};
