//! Compliance assistant: chat, SAR narratives, and synthesis refinement.
//!
//! Every operation works without a provider. When one is configured it is
//! tried first, and any failure is logged and answered from the
//! deterministic fallback instead.

use lexinel_core::config::LlmConfig;
use lexinel_core::{Rule, Violation};
use lexinel_rules::synthesis::SynthesisReport;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::offline;
use crate::provider::{LlmError, LlmProvider, Message, Role};
use crate::providers::create_provider;

/// Name reported as `mode` when answers come from the offline tables.
pub const OFFLINE_MODE: &str = "offline";

/// Client turns kept from the chat history.
const MAX_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChatAnswer {
    pub answer: String,
    pub citations: Vec<String>,
    pub mode: String,
}

/// A SAR narrative and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub text: String,
    pub mode: String,
}

pub struct ComplianceAssistant {
    provider: Option<Box<dyn LlmProvider>>,
    temperature: f32,
    max_tokens: u32,
}

impl ComplianceAssistant {
    /// Build from config. An unusable provider setting degrades to offline.
    pub fn from_config(config: &LlmConfig) -> Self {
        let provider = match create_provider(config) {
            Ok(p) => {
                info!(provider = p.name(), "LLM provider enabled");
                Some(p)
            }
            Err(LlmError::NotConfigured(reason)) if config.provider == OFFLINE_MODE => {
                info!(%reason, "compliance assistant running offline");
                None
            }
            Err(e) => {
                warn!(provider = %config.provider, error = %e, "LLM provider unavailable, running offline");
                None
            }
        };
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn offline() -> Self {
        Self {
            provider: None,
            temperature: 0.2,
            max_tokens: 2048,
        }
    }

    pub fn with_provider(provider: Box<dyn LlmProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider: Some(provider),
            temperature,
            max_tokens,
        }
    }

    /// Provider name, or `"offline"`.
    pub fn mode(&self) -> &str {
        self.provider.as_deref().map(|p| p.name()).unwrap_or(OFFLINE_MODE)
    }

    async fn complete(&self, messages: Vec<Message>) -> Option<Result<String, LlmError>> {
        let provider = self.provider.as_deref()?;
        Some(provider.complete(messages, self.temperature, self.max_tokens).await)
    }

    // ── Chat ────────────────────────────────────────────────────────

    pub async fn chat(&self, message: &str, history: &[Message], rules: &[Rule]) -> ChatAnswer {
        let mut messages = vec![Message::system(chat_system_prompt(rules))];
        let start = history.len().saturating_sub(MAX_HISTORY);
        messages.extend(history[start..].iter().filter(|m| m.role != Role::System).cloned());
        messages.push(Message::user(message));

        match self.complete(messages).await {
            Some(Ok(answer)) if !answer.trim().is_empty() => {
                let citations = cited_rules(&answer, rules);
                ChatAnswer {
                    answer,
                    citations,
                    mode: self.mode().to_string(),
                }
            }
            Some(Ok(_)) => {
                warn!(provider = self.mode(), "empty chat completion, answering offline");
                offline_answer(message)
            }
            Some(Err(e)) => {
                warn!(provider = self.mode(), error = %e, "chat completion failed, answering offline");
                offline_answer(message)
            }
            None => offline_answer(message),
        }
    }

    // ── SAR narrative ───────────────────────────────────────────────

    pub async fn sar_narrative(&self, violation: &Violation) -> Narrative {
        let prompt = format!(
            "Draft the narrative section of a FinCEN Suspicious Activity Report for the record below. \
             Write 2-3 short factual paragraphs in plain text: who, what, when, why it is suspicious, \
             and the action taken. Do not invent facts that are not in the record.\n\n{}",
            serde_json::to_string_pretty(violation).unwrap_or_default()
        );
        let messages = vec![
            Message::system("You are a BSA/AML compliance officer writing regulatory filings."),
            Message::user(prompt),
        ];

        match self.complete(messages).await {
            Some(Ok(text)) if !text.trim().is_empty() => Narrative {
                text: text.trim().to_string(),
                mode: self.mode().to_string(),
            },
            Some(Ok(_)) => template_fallback(violation, "empty completion"),
            Some(Err(e)) => template_fallback(violation, &e.to_string()),
            None => Narrative {
                text: template_narrative(violation),
                mode: OFFLINE_MODE.to_string(),
            },
        }
    }

    // ── Synthesis refinement ────────────────────────────────────────

    /// Ask the provider for clearer rule labels. Returns whether any label
    /// changed; the report is left untouched on any failure.
    pub async fn refine_labels(&self, report: &mut SynthesisReport) -> bool {
        if report.rules.is_empty() {
            return false;
        }
        let listing: Vec<serde_json::Value> = report
            .rules
            .iter()
            .map(|r| serde_json::json!({ "id": r.rule.id, "label": r.rule.label, "excerpt": r.excerpt }))
            .collect();
        let messages = vec![
            Message::system(
                "You name compliance rules. Reply with a JSON object mapping each rule id to a short \
                 label (max 5 words). No prose.",
            ),
            Message::user(serde_json::Value::Array(listing).to_string()),
        ];

        let reply = match self.complete(messages).await {
            Some(Ok(reply)) => reply,
            Some(Err(e)) => {
                warn!(error = %e, "label refinement failed, keeping synthesized labels");
                return false;
            }
            None => return false,
        };
        let labels: serde_json::Map<String, serde_json::Value> =
            match serde_json::from_str(strip_code_fence(&reply)) {
                Ok(map) => map,
                Err(e) => {
                    warn!(error = %e, "label refinement reply was not a JSON object");
                    return false;
                }
            };

        let mut changed = false;
        for r in &mut report.rules {
            let Some(label) = labels.get(&r.rule.id).and_then(|v| v.as_str()) else {
                continue;
            };
            let label = label.trim();
            if !label.is_empty() && label.len() <= 60 && label != r.rule.label {
                r.rule.label = label.to_string();
                changed = true;
            }
        }
        if changed {
            report.push_step(
                lexinel_rules::synthesis::Stage::Map,
                format!("Rule labels refined by {}", self.mode()),
            );
        }
        changed
    }
}

fn offline_answer(message: &str) -> ChatAnswer {
    let (answer, citations) = offline::respond(message);
    ChatAnswer {
        answer: answer.to_string(),
        citations: citations.iter().map(|c| c.to_string()).collect(),
        mode: OFFLINE_MODE.to_string(),
    }
}

fn template_fallback(violation: &Violation, reason: &str) -> Narrative {
    warn!(violation = %violation.id, %reason, "SAR narrative generation failed, using template");
    Narrative {
        text: template_narrative(violation),
        mode: OFFLINE_MODE.to_string(),
    }
}

fn chat_system_prompt(rules: &[Rule]) -> String {
    let mut prompt = String::from(
        "You are Lexinel, an AML compliance assistant for a bank's compliance team. Answer concisely \
         and cite rule ids (e.g. AML-R01) and regulatory clauses when they apply. The rules currently \
         on file are:\n",
    );
    for rule in rules {
        prompt.push_str(&format!(
            "- {} [{}] {} ({}): {}\n",
            rule.id,
            rule.status,
            rule.display_label(),
            rule.clause,
            rule.logic
        ));
    }
    prompt
}

/// Rule ids and clauses mentioned in `answer`, in rule order.
fn cited_rules(answer: &str, rules: &[Rule]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for rule in rules {
        for key in [&rule.id, &rule.clause] {
            if !key.is_empty() && answer.contains(key.as_str()) && !out.contains(key) {
                out.push(key.clone());
            }
        }
    }
    out
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Pull `Orig: X` / `Dest: Y` out of an evidence summary.
pub fn evidence_field<'a>(evidence: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!("{}: ", key);
    let rest = &evidence[evidence.find(&marker)? + marker.len()..];
    rest.split(',').next().map(str::trim).filter(|s| !s.is_empty())
}

/// Deterministic SAR narrative built only from the record's own fields.
pub fn template_narrative(v: &Violation) -> String {
    let evidence = v.evidence_summary.as_deref().unwrap_or("");
    let origin = evidence_field(evidence, "Orig").unwrap_or("an undisclosed account");
    let beneficiary = evidence_field(evidence, "Dest").unwrap_or("an undisclosed beneficiary");
    let tx_id = if v.transaction_id.is_empty() { v.id.as_str() } else { v.transaction_id.as_str() };
    let amount = v
        .amount
        .map(|a| format!("${:.2}", a))
        .unwrap_or_else(|| "an unreported amount".to_string());
    let when = if v.timestamp.is_empty() { "the reporting period" } else { v.timestamp.as_str() };
    let rule = match (&v.rule_id, &v.label) {
        (Some(id), Some(label)) => format!("rule {} ({})", id, label),
        (Some(id), None) => format!("rule {}", id),
        (None, Some(label)) => format!("the {} control", label),
        (None, None) => "automated monitoring".to_string(),
    };
    let clause = v
        .rule_clause
        .as_deref()
        .map(|c| format!(" under {}", c))
        .unwrap_or_default();
    let risk = v.risk.map(|r| r.as_str()).unwrap_or("UNRATED");

    let mut text = format!(
        "On {when}, account {origin} initiated transaction {tx_id} for {amount} to {beneficiary}. \
         The transaction was flagged by {rule}{clause} and assessed at {risk} risk.\n\n\
         Automated surveillance identified the activity as inconsistent with the customer's expected \
         profile. Supporting evidence: {evidence}.\n\n"
    );
    match &v.frozen_account {
        Some(account) => text.push_str(&format!(
            "The institution froze account {} pending investigation and is filing this report for \
             regulatory review.",
            account
        )),
        None => text.push_str(
            "The activity has been referred for human review and this report is filed for regulatory \
             review.",
        ),
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lexinel_core::Severity;

    struct FixedProvider(Result<String, ()>);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _: Vec<Message>, _: f32, _: u32) -> Result<String, LlmError> {
            self.0
                .clone()
                .map_err(|_| LlmError::ApiError { status: 503, body: "overloaded".into() })
        }
    }

    fn assistant(reply: Result<&str, ()>) -> ComplianceAssistant {
        ComplianceAssistant::with_provider(Box::new(FixedProvider(reply.map(str::to_string))), 0.2, 256)
    }

    fn rules() -> Vec<Rule> {
        lexinel_rules::vault::default_rules()
    }

    fn violation() -> Violation {
        serde_json::from_value(serde_json::json!({
            "id": "TXN-8821",
            "transaction_id": "TXN-8821",
            "amount": 14500.0,
            "risk": "CRITICAL",
            "label": "CTR Threshold",
            "rule_id": "AML-R01",
            "rule_clause": "BSA §1010.310",
            "evidence_summary": "Orig: ACC-4401, Dest: ACC-9977, Amount: 14500.00, Type: TRANSFER",
            "timestamp": "2024-01-15 03:22"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn offline_chat_uses_keyword_table() {
        let answer = ComplianceAssistant::offline().chat("what is ctr?", &[], &rules()).await;
        assert_eq!(answer.mode, "offline");
        assert!(answer.answer.starts_with("**Rule AML-R01"));
        assert_eq!(answer.citations, vec!["AML-R01", "BSA §1010.310"]);
    }

    #[tokio::test]
    async fn provider_answer_is_cited_against_rules() {
        let answer = assistant(Ok("AML-R02 covers this under FATF Rec. 10."))
            .chat("smurfing?", &[Message::user("hi"), Message::assistant("hello")], &rules())
            .await;
        assert_eq!(answer.mode, "fixed");
        assert_eq!(answer.citations, vec!["AML-R02", "FATF Rec. 10"]);
    }

    #[tokio::test]
    async fn provider_failure_falls_back_offline() {
        let answer = assistant(Err(())).chat("tell me about pii", &[], &rules()).await;
        assert_eq!(answer.mode, "offline");
        assert!(answer.answer.contains("AML-R04"));
    }

    #[tokio::test]
    async fn sar_narrative_falls_back_to_template() {
        let narrative = assistant(Err(())).sar_narrative(&violation()).await;
        assert_eq!(narrative.mode, "offline");
        assert!(narrative.text.starts_with("On 2024-01-15 03:22, account ACC-4401 initiated transaction TXN-8821 for $14500.00 to ACC-9977."));
        assert!(narrative.text.contains("rule AML-R01 (CTR Threshold) under BSA §1010.310"));
    }

    #[tokio::test]
    async fn sar_narrative_prefers_provider_text() {
        let narrative = assistant(Ok("  Drafted narrative.  ")).sar_narrative(&violation()).await;
        assert_eq!(narrative.text, "Drafted narrative.");
        assert_eq!(narrative.mode, "fixed");
    }

    #[test]
    fn template_mentions_frozen_account() {
        let mut v = violation();
        v.frozen_account = Some("ACC-4401".into());
        v.risk = Some(Severity::High);
        let text = template_narrative(&v);
        assert!(text.contains("assessed at HIGH risk"));
        assert!(text.contains("froze account ACC-4401"));
    }

    #[tokio::test]
    async fn refine_labels_applies_json_reply() {
        let mut report = lexinel_rules::synthesis::synthesize("memo", "Structuring is prohibited.");
        let reply = "```json\n{\"AML-R02\": \"Sub-threshold Velocity\"}\n```";
        assert!(assistant(Ok(reply)).refine_labels(&mut report).await);
        assert_eq!(report.rules[0].rule.label, "Sub-threshold Velocity");
    }

    #[tokio::test]
    async fn refine_labels_ignores_prose() {
        let mut report = lexinel_rules::synthesis::synthesize("memo", "Structuring is prohibited.");
        assert!(!assistant(Ok("Sure! Here are labels.")).refine_labels(&mut report).await);
        assert_eq!(report.rules[0].rule.label, "Structuring / Smurfing");
    }

    #[test]
    fn evidence_fields_split_on_commas() {
        let e = "Orig: ACC-1, Dest: ACC-2, Amount: 5.00";
        assert_eq!(evidence_field(e, "Orig"), Some("ACC-1"));
        assert_eq!(evidence_field(e, "Dest"), Some("ACC-2"));
        assert_eq!(evidence_field(e, "Route"), None);
    }
}
