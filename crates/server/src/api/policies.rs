//! Policy endpoints: rule listing, deploy/export, synthesis and validation.

use std::sync::Arc;

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use lexinel_core::Rule;
use lexinel_rules::synthesis::{synthesize as synthesize_rules, SynthesisReport};
use lexinel_rules::{logic, CompiledRule, DeployOutcome, DeploymentExport};

use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::feed::FeedStatus;
use crate::state::AppState;

/// Name offered to the browser for exported rule sets.
pub const EXPORT_FILE_NAME: &str = "lexinel_rules_export.json";

// ── Rules ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RuleView {
    #[serde(flatten)]
    pub rule: Rule,
    pub hits: u64,
    /// Whether the logic compiles.
    pub compiles: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_error: Option<String>,
}

/// List vault rules with hit stats
#[utoipa::path(
    get,
    path = "/api/policies/rules",
    tag = "Policies",
    responses((status = 200, description = "Rules in vault order", body = Vec<RuleView>))
)]
pub async fn list_rules(State(state): State<Arc<AppState>>) -> Json<Vec<RuleView>> {
    let rules = state.vault.read().expect("vault lock poisoned").rules().to_vec();
    let stats = state.rule_stats.read().expect("rule stats lock poisoned").clone();

    let views = rules
        .into_iter()
        .map(|mut rule| {
            let snapshot = stats.snapshot(&rule.id);
            if stats.flagged() > 0 {
                rule.hit_rate = Some(snapshot.hit_rate);
            }
            let compile_error = CompiledRule::compile(&rule).err().map(|e| e.to_string());
            RuleView {
                rule,
                hits: snapshot.hits,
                compiles: compile_error.is_none(),
                compile_error,
            }
        })
        .collect();
    Json(views)
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct DeployRequest {
    #[schema(value_type = Vec<Object>)]
    pub rules: Vec<serde_json::Value>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Deploy a rule set
///
/// Rules with no id, a duplicate id, or logic that does not compile are
/// skipped and reported; the rest replace same-id rules in the vault.
#[utoipa::path(
    post,
    path = "/api/policies/deploy-rules",
    tag = "Policies",
    request_body = DeployRequest,
    responses(
        (status = 200, description = "Deployment outcome", body = DeployOutcome),
        (status = 500, description = "Vault could not be saved", body = ErrorBody)
    )
)]
pub async fn deploy_rules(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeployRequest>,
) -> ApiResult<Json<DeployOutcome>> {
    let source = req
        .source
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "dashboard".to_string());
    let outcome = {
        let mut vault = state.vault.write().expect("vault lock poisoned");
        // Stage on a copy so a failed save leaves the live vault untouched.
        let mut staged = vault.clone();
        let outcome = staged.deploy(req.rules, &source);
        staged.save(&state.config.storage.rules_file)?;
        *vault = staged;
        outcome
    };

    info!(
        source = %source,
        deployed = outcome.deployed_count,
        skipped = outcome.skipped_count,
        "rules deployed"
    );
    let status = if outcome.skipped_count > 0 { FeedStatus::Warn } else { FeedStatus::Pass };
    state.feed.push(
        "N2L-Engine",
        "SYNC",
        "Rule Refresh",
        status,
        format!("{} deployed · {} skipped · {}", outcome.deployed_count, outcome.skipped_count, source),
    );
    Ok(Json(outcome))
}

/// Export the last deployment
#[utoipa::path(
    get,
    path = "/api/policies/export",
    tag = "Policies",
    responses((status = 200, description = "JSON attachment echoing the last deploy", body = DeploymentExport))
)]
pub async fn export_rules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let export = state.vault.read().expect("vault lock poisoned").export();
    (
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
        )],
        Json(export),
    )
}

// ── Validation ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ValidateRequest {
    pub logic: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ValidateResponse {
    pub valid: bool,
    /// Fields the expression reads, in order of first use.
    pub fields: Vec<String>,
}

/// Check a rule's logic without deploying it
#[utoipa::path(
    post,
    path = "/api/policies/validate",
    tag = "Policies",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Logic compiles", body = ValidateResponse),
        (status = 422, description = "Logic error with character position", body = ErrorBody)
    )
)]
pub async fn validate_logic(Json(req): Json<ValidateRequest>) -> ApiResult<Json<ValidateResponse>> {
    let expr = logic::compile(&req.logic)?;
    Ok(Json(ValidateResponse {
        valid: true,
        fields: expr.fields().iter().map(|f| f.name().to_string()).collect(),
    }))
}

// ── Synthesis ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SynthesizeRequest {
    #[serde(default)]
    pub source: Option<String>,
    pub text: String,
}

/// Synthesize rules from policy text
///
/// Accepts `{source, text}` as JSON, or a multipart upload with a `file`
/// field (PDF or plain text) and an optional `source` field.
#[utoipa::path(
    post,
    path = "/api/policies/synthesize",
    tag = "Policies",
    request_body(content = SynthesizeRequest, description = "JSON body or multipart upload"),
    responses(
        (status = 200, description = "Synthesized pending rules and step log", body = SynthesisReport),
        (status = 400, description = "No readable policy text", body = ErrorBody)
    )
)]
pub async fn synthesize(State(state): State<Arc<AppState>>, request: Request) -> ApiResult<Json<SynthesisReport>> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (source, text) = if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?;
        read_upload(multipart).await?
    } else {
        let Json(req) = Json::<SynthesizeRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        (req.source.unwrap_or_else(|| "policy text".to_string()), req.text)
    };

    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("'{}' contains no extractable text", source)));
    }

    let mut report = synthesize_rules(&source, &text);
    if state.assistant.refine_labels(&mut report).await {
        info!(source = %source, "synthesized labels refined");
    }
    Ok(Json(report))
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<(String, String)> {
    let mut source: Option<String> = None;
    let mut text: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "source" => {
                source = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Failed to read source: {}", e)))?,
                );
            }
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                let extracted = extract_text(&filename, bytes.to_vec()).await?;
                info!(file = %filename, chars = extracted.len(), "policy document extracted");
                source.get_or_insert(filename);
                text = Some(extracted);
            }
            other => warn!(field = %other, "ignoring unexpected multipart field"),
        }
    }

    let text = text.ok_or_else(|| ApiError::BadRequest("No file provided".into()))?;
    Ok((source.unwrap_or_else(|| "upload".into()), text))
}

/// PDFs go through `pdf-extract` off the async runtime; anything else must
/// be UTF-8 text.
async fn extract_text(filename: &str, bytes: Vec<u8>) -> ApiResult<String> {
    if bytes.starts_with(b"%PDF") || filename.to_ascii_lowercase().ends_with(".pdf") {
        return tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| ApiError::Internal(format!("extraction task failed: {}", e)))?
            .map_err(|e| ApiError::BadRequest(format!("Text extraction failed: {}", e)));
    }
    String::from_utf8(bytes).map_err(|_| ApiError::BadRequest(format!("'{}' is neither a PDF nor UTF-8 text", filename)))
}
