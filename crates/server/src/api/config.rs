use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// Active configuration
///
/// Secrets are never included; the LLM section only says whether a
/// provider is configured.
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "Config",
    responses((status = 200, description = "Redacted configuration", body = Object))
)]
pub async fn config(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.config.redacted_summary())
}
