//! Compliance assistant chat.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::debug;

use lexinel_llm::{ChatAnswer, Message};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ChatRequest {
    pub message: String,
    /// Earlier turns, oldest first.
    #[serde(default)]
    pub history: Vec<Message>,
}

/// Ask the compliance assistant
///
/// Answers questions about the deployed rules. Uses the configured LLM
/// provider and falls back to canned answers (`mode = "offline"`).
#[utoipa::path(
    post,
    path = "/api/v1/chat",
    tag = "Assistant",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant answer", body = ChatAnswer),
        (status = 400, description = "Empty message", body = crate::error::ErrorBody),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatAnswer>> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }
    let rules = state.vault.read().expect("vault lock poisoned").rules().to_vec();
    debug!(history = req.history.len(), rules = rules.len(), "chat request");

    let answer = state.assistant.chat(message, &req.history, &rules).await;
    Ok(Json(answer))
}
