//! Sentinel endpoints: scan stream, review queue, dossiers and SARs.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use lexinel_core::Violation;
use lexinel_rules::explain::{explain, Dossier};

use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::hitl::UNKNOWN_ACCOUNT;
use crate::scan::{self, ScanStatus};
use crate::sar;
use crate::state::AppState;

/// SSE events buffered ahead of a slow client.
const SCAN_CHANNEL_CAPACITY: usize = 32;

#[derive(Serialize, utoipa::ToSchema)]
pub struct StatusReply {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

fn required_id(body: &Map<String, Value>) -> ApiResult<String> {
    body.get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("Missing violation id".into()))
}

// ── Scan ────────────────────────────────────────────────────────────

/// Stream a sentinel scan
///
/// One `data:` event per record, each a JSON `ScanResult`. The stream ends
/// by closing the connection once every record has been sent.
#[utoipa::path(
    get,
    path = "/api/sentinel/scan",
    tag = "Sentinel",
    responses(
        (status = 200, description = "SSE stream of scan results", content_type = "text/event-stream"),
        (status = 409, description = "A scan is already running", body = ErrorBody)
    )
)]
pub async fn scan_stream(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Sse<ReceiverStream<Result<Event, Infallible>>>> {
    let guard = state.scan.try_begin(state.transactions.len())?;
    let (rules, failures) = state.compile_rules();
    info!(rules = rules.len(), failed = failures.len(), records = state.transactions.len(), "scan stream opened");

    let (tx, rx) = tokio::sync::mpsc::channel(SCAN_CHANNEL_CAPACITY);
    tokio::spawn(scan::run_scan(Arc::clone(&state), guard, rules, tx));
    Ok(Sse::new(ReceiverStream::new(rx)))
}

/// Current scan state
#[utoipa::path(
    get,
    path = "/api/sentinel/scan/status",
    tag = "Sentinel",
    responses((status = 200, description = "Scan runner status", body = ScanStatus))
)]
pub async fn scan_status(State(state): State<Arc<AppState>>) -> Json<ScanStatus> {
    Json(state.scan.status())
}

// ── Review queue ────────────────────────────────────────────────────

/// List queued violations
#[utoipa::path(
    get,
    path = "/api/sentinel/violations",
    tag = "Sentinel",
    responses((status = 200, description = "Violations awaiting review", body = Vec<Object>))
)]
pub async fn list_violations(State(state): State<Arc<AppState>>) -> Json<Vec<Violation>> {
    Json(state.hitl.list())
}

/// Send a violation to human review
#[utoipa::path(
    post,
    path = "/api/sentinel/review",
    tag = "Sentinel",
    request_body(content = Object, description = "Violation record; `id` is required"),
    responses(
        (status = 200, description = "Queued for review", body = StatusReply),
        (status = 400, description = "Missing violation id", body = ErrorBody)
    )
)]
pub async fn review(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<Json<StatusReply>> {
    let id = required_id(&body)?;
    state
        .hitl
        .review(&id, body)
        .map_err(|e| ApiError::BadRequest(format!("invalid violation record: {}", e)))?;
    Ok(Json(StatusReply {
        status: "queued_for_review",
        id: Some(id),
        account_id: None,
    }))
}

/// Freeze the account behind a violation
#[utoipa::path(
    post,
    path = "/api/sentinel/freeze",
    tag = "Sentinel",
    request_body(content = Object, description = "`{id, account_id, ...}`; account defaults to UNKNOWN"),
    responses(
        (status = 200, description = "Account frozen", body = StatusReply),
        (status = 400, description = "Missing violation id", body = ErrorBody)
    )
)]
pub async fn freeze(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<Json<StatusReply>> {
    let id = required_id(&body)?;
    let account_id = body
        .get("account_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_ACCOUNT)
        .to_string();
    state
        .hitl
        .freeze(&id, &account_id, body)
        .map_err(|e| ApiError::BadRequest(format!("invalid violation record: {}", e)))?;
    Ok(Json(StatusReply {
        status: "frozen",
        id: None,
        account_id: Some(account_id),
    }))
}

/// Clear a violation from the queue
#[utoipa::path(
    post,
    path = "/api/sentinel/resolve",
    tag = "Sentinel",
    request_body(content = Object, description = "`{id}`"),
    responses(
        (status = 200, description = "Resolved", body = StatusReply),
        (status = 400, description = "Missing violation id", body = ErrorBody)
    )
)]
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<Json<StatusReply>> {
    let id = required_id(&body)?;
    if !state.hitl.resolve(&id) {
        info!(violation = %id, "resolve requested for a record not in the queue");
    }
    Ok(Json(StatusReply {
        status: "resolved",
        id: None,
        account_id: None,
    }))
}

// ── Dossier ─────────────────────────────────────────────────────────

/// Explain why a transaction was flagged
///
/// Replays the dataset up to the transaction so velocity rules see the same
/// window the scan did.
#[utoipa::path(
    get,
    path = "/api/sentinel/violations/{id}/dossier",
    tag = "Sentinel",
    params(("id" = String, Path, description = "Violation or transaction id")),
    responses(
        (status = 200, description = "Explanation and counterfactual", body = Dossier),
        (status = 404, description = "Unknown transaction", body = ErrorBody)
    )
)]
pub async fn violation_dossier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Dossier>> {
    let tx_id = state.hitl.get(&id).map(|v| v.transaction_id).unwrap_or_else(|| id.clone());
    let position = state
        .transactions
        .iter()
        .position(|t| t.id == tx_id)
        .ok_or_else(|| ApiError::NotFound(format!("transaction '{}' not found", tx_id)))?;

    let (rules, _) = state.compile_rules();
    let hours = state.config.scan.velocity_window_hours;
    let history = &state.transactions[..=position];
    let results = rules.scan(history, hours);
    let result = results
        .last()
        .ok_or_else(|| ApiError::Internal("empty replay".into()))?;
    Ok(Json(explain(&state.transactions[position], result, &rules, hours)))
}

// ── SAR ─────────────────────────────────────────────────────────────

/// Generate a SAR PDF
///
/// Accepts any violation record. A body carrying only an `id` that matches a
/// queued record is filled in from the queue.
#[utoipa::path(
    post,
    path = "/api/sentinel/sar",
    tag = "Sentinel",
    request_body(content = Object, description = "Violation record"),
    responses(
        (status = 200, description = "SAR document", content_type = "application/pdf"),
        (status = 400, description = "Malformed record", body = ErrorBody),
        (status = 500, description = "PDF rendering failed", body = ErrorBody)
    )
)]
pub async fn generate_sar(
    State(state): State<Arc<AppState>>,
    Json(mut body): Json<Map<String, Value>>,
) -> ApiResult<impl IntoResponse> {
    let id = body
        .get("id")
        .or_else(|| body.get("transaction_id"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown")
        .to_string();

    let queued = if body.len() <= 1 { state.hitl.get(&id) } else { None };
    let violation = match queued {
        Some(v) => v,
        None => {
            body.insert("id".into(), Value::String(id.clone()));
            serde_json::from_value::<Violation>(Value::Object(body))
                .map_err(|e| ApiError::BadRequest(format!("invalid violation record: {}", e)))?
        }
    };

    let narrative = state.assistant.sar_narrative(&violation).await;
    let pdf = sar::render_sar(&violation, &narrative, Utc::now()).map_err(|e| ApiError::Internal(e.to_string()))?;
    info!(violation = %violation.id, bytes = pdf.len(), narrative = %narrative.mode, "SAR generated");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", sar::file_name(&violation)),
            ),
        ],
        pdf,
    ))
}
