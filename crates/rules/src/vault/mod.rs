//! YAML-backed rule vault.
//!
//! The vault holds every rule the console knows about, whatever its status,
//! and remembers the exact payload of the last deployment so it can be
//! exported verbatim.

mod defaults;
mod error;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use lexinel_core::Rule;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{CompileFailure, RuleSet};
use crate::logic;

pub use defaults::{default_rules, AMLD6_POLICY, BSA_POLICY, FATF_POLICY};
pub use error::{Result, VaultError};

/// Source label of the rules a fresh vault starts with.
pub const BUILT_IN_SOURCE: &str = "built-in";

/// A rule the deploy request carried but the vault refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SkippedRule {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DeployOutcome {
    pub deployed_count: usize,
    pub skipped_count: usize,
    pub skipped: Vec<SkippedRule>,
}

/// The rule list and source as they were supplied to a deploy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub source: String,
    pub rules: Vec<serde_json::Value>,
    pub deployed_at: DateTime<Utc>,
}

/// Body of the export download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DeploymentExport {
    pub source: String,
    #[schema(value_type = Vec<Object>)]
    pub rules: Vec<serde_json::Value>,
    pub exported_at: DateTime<Utc>,
}

/// On-disk layout of the vault file.
#[derive(Debug, Serialize, Deserialize)]
struct VaultDocument {
    source: String,
    #[serde(default)]
    deployed_at: Option<DateTime<Utc>>,
    rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_deployment: Option<Deployment>,
}

#[derive(Debug, Clone)]
pub struct RuleVault {
    source: String,
    deployed_at: Option<DateTime<Utc>>,
    rules: Vec<Rule>,
    last_deployment: Option<Deployment>,
}

impl Default for RuleVault {
    fn default() -> Self {
        Self {
            source: BUILT_IN_SOURCE.to_string(),
            deployed_at: None,
            rules: default_rules(),
            last_deployment: None,
        }
    }
}

impl RuleVault {
    /// Read the vault from `path`, or start from the built-in rules when the
    /// file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no rule vault on disk, using built-in rules");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let doc: VaultDocument = serde_yaml::from_str(&contents)?;

        let mut seen = HashSet::new();
        for rule in &doc.rules {
            if rule.id.trim().is_empty() {
                return Err(VaultError::Validation("rule id must not be empty".to_string()));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(VaultError::Validation(format!("duplicate rule id '{}'", rule.id)));
            }
        }

        info!(path = %path.display(), rules = doc.rules.len(), source = %doc.source, "loaded rule vault");
        Ok(Self {
            source: doc.source,
            deployed_at: doc.deployed_at,
            rules: doc.rules,
            last_deployment: doc.last_deployment,
        })
    }

    /// Write the vault to `path` as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let doc = VaultDocument {
            source: self.source.clone(),
            deployed_at: self.deployed_at,
            rules: self.rules.clone(),
            last_deployment: self.last_deployment.clone(),
        };
        fs::write(path, serde_yaml::to_string(&doc)?)?;
        Ok(())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn deployed_at(&self) -> Option<DateTime<Utc>> {
        self.deployed_at
    }

    pub fn deployed_count(&self) -> usize {
        self.rules.iter().filter(|r| r.is_deployed()).count()
    }

    /// Compile the rules currently in force.
    pub fn compile(&self) -> (RuleSet, Vec<CompileFailure>) {
        RuleSet::compile(&self.rules)
    }

    /// Deploy a batch of rules.
    ///
    /// Each entry is validated on its own: entries that are not a rule, have
    /// an empty id, repeat an id seen earlier in the same request, or carry
    /// logic that does not compile are skipped with a reason. Accepted rules
    /// replace vault rules with the same id and are appended otherwise. The
    /// request is kept verbatim for [`RuleVault::export`].
    pub fn deploy(&mut self, raw: Vec<serde_json::Value>, source: &str) -> DeployOutcome {
        let mut skipped = Vec::new();
        let mut accepted: Vec<Rule> = Vec::new();
        let mut seen = HashSet::new();

        for value in &raw {
            let id = value
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .trim()
                .to_string();
            let skip = |reason: String| SkippedRule { id: id.clone(), reason };

            if id.is_empty() {
                skipped.push(skip("missing rule id".to_string()));
                continue;
            }
            if !seen.insert(id.clone()) {
                skipped.push(skip("duplicate id in request".to_string()));
                continue;
            }
            let rule = match Rule::from_record(value) {
                Ok(rule) => rule,
                Err(e) => {
                    skipped.push(skip(format!("invalid rule: {}", e)));
                    continue;
                }
            };
            if let Err(e) = logic::compile(&rule.logic) {
                skipped.push(skip(format!("logic error {}", e)));
                continue;
            }
            accepted.push(Rule { id, ..rule });
        }

        let deployed_count = accepted.len();
        for rule in accepted {
            match self.rules.iter_mut().find(|r| r.id == rule.id) {
                Some(existing) => *existing = rule,
                None => self.rules.push(rule),
            }
        }

        let now = Utc::now();
        self.source = source.to_string();
        self.deployed_at = Some(now);
        self.last_deployment = Some(Deployment {
            source: source.to_string(),
            rules: raw,
            deployed_at: now,
        });

        for s in &skipped {
            warn!(rule_id = %s.id, reason = %s.reason, "rule skipped on deploy");
        }
        info!(source, deployed = deployed_count, skipped = skipped.len(), "rules deployed");

        DeployOutcome {
            deployed_count,
            skipped_count: skipped.len(),
            skipped,
        }
    }

    /// The last deployment exactly as it was supplied, or the current vault
    /// contents when nothing has been deployed yet.
    pub fn export(&self) -> DeploymentExport {
        match &self.last_deployment {
            Some(d) => DeploymentExport {
                source: d.source.clone(),
                rules: d.rules.clone(),
                exported_at: Utc::now(),
            },
            None => DeploymentExport {
                source: self.source.clone(),
                rules: self
                    .rules
                    .iter()
                    .filter_map(|r| serde_json::to_value(r).ok())
                    .collect(),
                exported_at: Utc::now(),
            },
        }
    }
}
