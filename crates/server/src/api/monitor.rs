//! Live policy monitor feed.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::feed::{FeedCounts, FeedEntry, FeedStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct FeedQuery {
    /// `pass`, `warn` or `block`.
    pub status: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FeedResponse {
    /// Newest first.
    pub entries: Vec<FeedEntry>,
    /// Counts over the whole feed, not just the filtered entries.
    pub counts: FeedCounts,
    pub paused: bool,
    pub capacity: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PauseReply {
    pub paused: bool,
}

/// Read the enforcement feed
#[utoipa::path(
    get,
    path = "/api/monitor/feed",
    tag = "Monitor",
    params(FeedQuery),
    responses(
        (status = 200, description = "Feed entries and counts", body = FeedResponse),
        (status = 400, description = "Unknown status filter", body = crate::error::ErrorBody),
    )
)]
pub async fn feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<FeedResponse>> {
    let filter = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(raw.parse::<FeedStatus>().map_err(ApiError::BadRequest)?),
    };
    Ok(Json(FeedResponse {
        entries: state.feed.snapshot(filter),
        counts: state.feed.counts(),
        paused: state.feed.is_paused(),
        capacity: state.feed.capacity(),
    }))
}

/// Pause simulated traffic
#[utoipa::path(
    post,
    path = "/api/monitor/pause",
    tag = "Monitor",
    responses((status = 200, description = "Feed paused", body = PauseReply))
)]
pub async fn pause(State(state): State<Arc<AppState>>) -> Json<PauseReply> {
    state.feed.pause();
    info!("live feed paused");
    Json(PauseReply { paused: true })
}

/// Resume simulated traffic
#[utoipa::path(
    post,
    path = "/api/monitor/resume",
    tag = "Monitor",
    responses((status = 200, description = "Feed resumed", body = PauseReply))
)]
pub async fn resume(State(state): State<Arc<AppState>>) -> Json<PauseReply> {
    state.feed.resume();
    info!("live feed resumed");
    Json(PauseReply { paused: false })
}
