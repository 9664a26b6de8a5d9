//! Server startup: shared state initialization and background task spawning.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use lexinel_core::config::Config;
use lexinel_core::dataset::load_transactions;
use lexinel_llm::ComplianceAssistant;
use lexinel_rules::RuleVault;

use crate::feed;
use crate::state::AppState;

/// Load the vault, the dataset and the assistant into a fresh `AppState`.
pub fn build_app_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let vault = RuleVault::load(&config.storage.rules_file)
        .with_context(|| format!("failed to load rule vault {}", config.storage.rules_file.display()))?;
    let (_, failures) = vault.compile();
    for failure in &failures {
        warn!(rule = %failure.rule_id, error = %failure.error, "rule logic does not compile, rule disabled");
    }
    info!(rules = vault.rules().len(), disabled = failures.len(), "rule vault ready");

    let transactions = load_transactions(config.storage.transactions_file.as_deref())
        .context("failed to load transaction dataset")?;
    info!(transactions = transactions.len(), "dataset ready");

    let assistant = ComplianceAssistant::from_config(&config.llm);

    Ok(Arc::new(AppState::new(config.clone(), vault, transactions, assistant)))
}

/// Spawn long-running background tasks.
pub fn spawn_background(state: &Arc<AppState>) {
    feed::spawn_ticker(state.feed.clone(), &state.config.feed);
    info!(
        capacity = state.feed.capacity(),
        "live feed simulator started"
    );
}
