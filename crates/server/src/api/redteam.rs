//! Red Team Hub: scenario catalogue and streamed attack runs.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use lexinel_core::Rule;
use lexinel_rules::redteam::{find_scenario, RedTeam, RedTeamReport, Scenario, SCENARIOS};
use lexinel_rules::RuleSet;

use crate::state::AppState;

const ATTACK_CHANNEL_CAPACITY: usize = 32;

/// List attack scenarios
#[utoipa::path(
    get,
    path = "/api/redteam/scenarios",
    tag = "Red Team",
    responses((status = 200, description = "Available scenarios", body = Vec<Object>))
)]
pub async fn list_scenarios() -> Json<&'static [Scenario]> {
    Json(SCENARIOS)
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct AttackRequest {
    /// Free-form target description, or `{"scenarios": [ids]}`.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub system_spec: Value,
    /// Optional rule list (`[..]` or `{"rules": [..]}`) replacing the vault for this run.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub policy_matrix: Value,
}

/// Run an attack simulation
///
/// Streams `data: {"log": "..."}` events followed by one
/// `data: {"report": {...}}` event, then closes.
#[utoipa::path(
    post,
    path = "/api/redteam/attack",
    tag = "Red Team",
    request_body = AttackRequest,
    responses((status = 200, description = "Log lines then the report", content_type = "text/event-stream"))
)]
pub async fn attack(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AttackRequest>,
) -> Sse<ReceiverStream<Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(ATTACK_CHANNEL_CAPACITY);
    let mut preamble = Vec::new();

    let (rules, rule_origin) = match matrix_rules(&req.policy_matrix) {
        Some(rules) => {
            let (set, failures) = RuleSet::compile(&rules);
            for f in &failures {
                preamble.push(format!("Policy matrix rule {} rejected: {}", f.rule_id, f.error));
            }
            (set, "policy matrix")
        }
        None => (state.compile_rules().0, "rule vault"),
    };
    let (scenarios, unknown) = select_scenarios(&req.system_spec);
    for id in unknown {
        preamble.insert(0, format!("Unknown scenario '{}' skipped.", id));
    }
    preamble.insert(0, format!("Target: {}", describe_target(&req.system_spec)));
    preamble.push(format!(
        "Loaded {} active rule(s) from the {}; {} scenario(s) queued.",
        rules.len(),
        rule_origin,
        scenarios.len()
    ));

    let delay = Duration::from_millis(state.config.scan.event_delay_ms);
    let hours = state.config.scan.velocity_window_hours;
    info!(scenarios = scenarios.len(), rules = rules.len(), "red-team attack started");

    tokio::spawn(async move {
        for line in preamble {
            if !send(&tx, json!({ "log": line }), delay).await {
                return;
            }
        }
        let team = RedTeam::new(&rules, hours);
        let mut vectors = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            let outcome = team.run_scenario(scenario);
            for line in outcome.logs {
                if !send(&tx, json!({ "log": line }), delay).await {
                    return;
                }
            }
            vectors.push(outcome.vector);
        }
        let report = RedTeamReport::from_vectors(vectors);
        info!(score = report.overall_resilience_score, verdict = ?report.verdict, "red-team attack finished");
        send(&tx, json!({ "report": report }), Duration::ZERO).await;
    });

    Sse::new(ReceiverStream::new(rx))
}

async fn send(tx: &mpsc::Sender<Result<Event, Infallible>>, payload: Value, delay: Duration) -> bool {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let ok = tx.send(Ok(Event::default().data(payload.to_string()))).await.is_ok();
    if !ok {
        warn!("red-team stream closed by client");
    }
    ok
}

/// Rules carried by the policy matrix, if it carries any.
fn matrix_rules(matrix: &Value) -> Option<Vec<Rule>> {
    let list = match matrix {
        Value::Array(items) => items,
        Value::Object(map) => map.get("rules")?.as_array()?,
        _ => return None,
    };
    let rules: Vec<Rule> = list
        .iter()
        .filter_map(|raw| match serde_json::from_value::<Rule>(raw.clone()) {
            Ok(rule) => Some(rule),
            Err(e) => {
                warn!(error = %e, "ignoring malformed policy matrix rule");
                None
            }
        })
        .collect();
    (!rules.is_empty()).then_some(rules)
}

/// Scenarios named in `system_spec.scenarios`, or all of them. Returns unknown ids too.
fn select_scenarios(spec: &Value) -> (Vec<&'static Scenario>, Vec<String>) {
    let Some(ids) = spec.get("scenarios").and_then(Value::as_array) else {
        return (SCENARIOS.iter().collect(), Vec::new());
    };
    let mut selected = Vec::new();
    let mut unknown = Vec::new();
    for id in ids.iter().filter_map(Value::as_str) {
        match find_scenario(id) {
            Some(s) if !selected.iter().any(|x: &&Scenario| x.id == s.id) => selected.push(s),
            Some(_) => {}
            None => unknown.push(id.to_string()),
        }
    }
    (selected, unknown)
}

fn describe_target(spec: &Value) -> String {
    match spec {
        Value::Null => "deployed AML sentinel".to_string(),
        Value::String(s) if s.trim().is_empty() => "deployed AML sentinel".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
