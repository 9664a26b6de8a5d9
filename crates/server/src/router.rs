//! HTTP router construction.
//!
//! Assembles all Axum routes, middleware, and OpenAPI docs into a single `Router`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::state::AppState;

/// Largest policy upload accepted by `/api/policies/synthesize`.
const MAX_POLICY_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/health", get(api::health))
        .route("/api/dashboard/stats", get(api::dashboard_stats))
        .route("/api/config", get(api::config))
        // Sentinel
        .route("/api/sentinel/scan", get(api::scan_stream))
        .route("/api/sentinel/scan/status", get(api::scan_status))
        .route("/api/sentinel/violations", get(api::list_violations))
        .route("/api/sentinel/violations/{id}/dossier", get(api::violation_dossier))
        .route("/api/sentinel/review", post(api::review))
        .route("/api/sentinel/freeze", post(api::freeze))
        .route("/api/sentinel/resolve", post(api::resolve))
        .route("/api/sentinel/sar", post(api::generate_sar))
        // Policies
        .route("/api/policies/rules", get(api::list_rules))
        .route("/api/policies/deploy-rules", post(api::deploy_rules))
        .route("/api/policies/export", get(api::export_rules))
        .route("/api/policies/validate", post(api::validate_logic))
        .route(
            "/api/policies/synthesize",
            post(api::synthesize).layer(DefaultBodyLimit::max(MAX_POLICY_UPLOAD_BYTES)),
        )
        // Red team
        .route("/api/redteam/scenarios", get(api::list_scenarios))
        .route("/api/redteam/attack", post(api::attack))
        // Assistant
        .route("/api/v1/chat", post(api::chat))
        // Monitor
        .route("/api/monitor/feed", get(api::feed))
        .route("/api/monitor/pause", post(api::pause))
        .route("/api/monitor/resume", post(api::resume))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
        .merge(Scalar::with_url("/docs", api::ApiDoc::openapi()))
}

/// `*` allows any origin; anything else is a comma-separated origin list.
fn cors_layer(origin: &str) -> CorsLayer {
    let origin = origin.trim();
    if origin.is_empty() || origin == "*" {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origin
        .split(',')
        .filter_map(|o| {
            let o = o.trim();
            match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            }
        })
        .collect();
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}
