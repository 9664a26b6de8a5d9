//! OpenAPI documentation aggregator.
//!
//! Collects every `#[utoipa::path]` handler and the `ToSchema` types they
//! reference into one OpenAPI document, served through Scalar at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lexinel API",
        version = "0.1.0",
        description = "AML compliance engine: streamed transaction scanning, human review, rule vault, policy synthesis and red-team simulation.",
    ),
    tags(
        (name = "Health", description = "Liveness and dashboard counters"),
        (name = "Sentinel", description = "Streamed scans, the review queue, dossiers and SAR drafts"),
        (name = "Policies", description = "Rule vault, deploy/export, logic validation and policy synthesis"),
        (name = "Red Team", description = "Attack scenarios replayed against the deployed rules"),
        (name = "Assistant", description = "Compliance Q&A over the active rules"),
        (name = "Monitor", description = "Live enforcement feed"),
        (name = "Config", description = "Redacted runtime configuration"),
    ),
    paths(
        // Health
        crate::api::health::health,
        crate::api::health::dashboard_stats,
        // Sentinel
        crate::api::sentinel::scan_stream,
        crate::api::sentinel::scan_status,
        crate::api::sentinel::list_violations,
        crate::api::sentinel::review,
        crate::api::sentinel::freeze,
        crate::api::sentinel::resolve,
        crate::api::sentinel::violation_dossier,
        crate::api::sentinel::generate_sar,
        // Policies
        crate::api::policies::list_rules,
        crate::api::policies::deploy_rules,
        crate::api::policies::export_rules,
        crate::api::policies::validate_logic,
        crate::api::policies::synthesize,
        // Red Team
        crate::api::redteam::list_scenarios,
        crate::api::redteam::attack,
        // Assistant
        crate::api::chat::chat,
        // Monitor
        crate::api::monitor::feed,
        crate::api::monitor::pause,
        crate::api::monitor::resume,
        // Config
        crate::api::config::config,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::api::health::HealthResponse,
        crate::api::health::DashboardStats,
        crate::api::sentinel::StatusReply,
        crate::scan::ScanState,
        crate::scan::ScanStatus,
        crate::api::policies::RuleView,
        crate::api::policies::DeployRequest,
        crate::api::policies::ValidateRequest,
        crate::api::policies::ValidateResponse,
        crate::api::policies::SynthesizeRequest,
        crate::api::redteam::AttackRequest,
        crate::api::chat::ChatRequest,
        crate::api::monitor::FeedResponse,
        crate::api::monitor::PauseReply,
        crate::feed::FeedEntry,
        crate::feed::FeedStatus,
        crate::feed::FeedCounts,
        lexinel_core::Rule,
        lexinel_core::RuleStatus,
        lexinel_core::Severity,
        lexinel_core::Verdict,
        lexinel_core::Detection,
        lexinel_core::ScanResult,
        lexinel_core::ReviewStatus,
        lexinel_rules::DeployOutcome,
        lexinel_rules::SkippedRule,
        lexinel_rules::DeploymentExport,
        lexinel_rules::RuleHits,
        lexinel_rules::explain::Dossier,
        lexinel_rules::synthesis::SynthesisReport,
        lexinel_rules::synthesis::SynthesisStep,
        lexinel_rules::synthesis::SynthesizedRule,
        lexinel_rules::synthesis::Stage,
        lexinel_rules::redteam::RedTeamReport,
        lexinel_rules::redteam::AttackVector,
        lexinel_rules::redteam::RunVerdict,
        lexinel_llm::ChatAnswer,
        lexinel_llm::Message,
        lexinel_llm::Role,
    )),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/dashboard/stats",
            "/api/sentinel/scan",
            "/api/sentinel/sar",
            "/api/sentinel/violations/{id}/dossier",
            "/api/policies/deploy-rules",
            "/api/policies/validate",
            "/api/redteam/attack",
            "/api/v1/chat",
            "/api/monitor/feed",
            "/api/config",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
