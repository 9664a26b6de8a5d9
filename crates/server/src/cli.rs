//! CLI argument parsing and offline subcommands.

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};

use lexinel_core::config::Config;
use lexinel_core::dataset::load_transactions;
use lexinel_rules::{RuleStats, RuleVault};

/// Lexinel AML compliance server.
#[derive(Parser, Debug)]
#[command(name = "lexinel-server", version, about)]
pub struct Cli {
    /// Config profile; keys are read as `{PROFILE}_{KEY}` before `{KEY}`.
    #[arg(long, global = true, env = "LEXINEL_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP server (default).
    Serve,
    /// Scan the dataset once with the vault rules and print a summary.
    Scan {
        /// Print every flagged transaction, not just the totals.
        #[arg(long)]
        verbose: bool,
    },
    /// Compile every rule in a vault file and report logic errors.
    ValidateRules {
        /// Vault YAML to check. Defaults to the configured rules file.
        file: Option<PathBuf>,
    },
}

impl Cli {
    pub fn config(&self) -> Config {
        match &self.profile {
            Some(profile) => Config::for_profile(profile),
            None => Config::from_env(),
        }
    }
}

/// Run the `scan` subcommand.
pub fn scan(config: &Config, verbose: bool) -> anyhow::Result<()> {
    let vault = RuleVault::load(&config.storage.rules_file)?;
    let (rules, failures) = vault.compile();
    for f in &failures {
        println!("skipped {}: {}", f.rule_id, f.error);
    }
    let transactions = load_transactions(config.storage.transactions_file.as_deref())?;
    let results = rules.scan(&transactions, config.scan.velocity_window_hours);

    let mut stats = RuleStats::default();
    for result in &results {
        stats.record(result);
        if verbose && result.verdict.is_flagged() {
            let rule_ids: Vec<&str> = result.detections.iter().map(|d| d.rule_id.as_str()).collect();
            println!(
                "{:<12} risk {:>3}  {}",
                result.transaction_id,
                result.risk_score,
                rule_ids.join(", ")
            );
        }
    }

    println!("Scanned {} transactions, {} flagged", stats.evaluated(), stats.flagged());
    for compiled in rules.rules() {
        println!("  {:<10} {:>5} hit(s)  {}", compiled.rule.id, stats.hits(&compiled.rule.id), compiled.rule.label);
    }
    Ok(())
}

/// Run the `validate-rules` subcommand. Fails when any rule does not compile.
pub fn validate_rules(config: &Config, file: Option<PathBuf>) -> anyhow::Result<()> {
    let path = file.unwrap_or_else(|| config.storage.rules_file.clone());
    let vault = RuleVault::load(&path)?;
    let (rules, failures) = vault.compile();

    for compiled in rules.rules() {
        println!("ok      {}", compiled.rule.id);
    }
    for f in &failures {
        println!("error   {} at {}: {}", f.rule_id, f.error.position, f.error.message);
    }
    if !failures.is_empty() {
        bail!("{} of {} rule(s) failed to compile", failures.len(), vault.rules().len());
    }
    println!("{} rule(s) valid in {}", rules.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::parse_from(["lexinel-server"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn validate_rules_takes_an_optional_file() {
        let cli = Cli::parse_from(["lexinel-server", "validate-rules", "rules.yml"]);
        match cli.command {
            Some(Command::ValidateRules { file }) => assert_eq!(file, Some(PathBuf::from("rules.yml"))),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn verbose_scan_runs_over_the_sample() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::for_profile("");
        config.storage.rules_file = dir.path().join("rules.yml");
        config.storage.transactions_file = None;
        scan(&config, true).unwrap();
    }

    #[test]
    fn validate_rules_rejects_bad_logic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yml");
        std::fs::write(
            &path,
            "source: test\nrules:\n  - id: BAD-1\n    logic: \"amount >\"\n  - id: OK-1\n    logic: \"amount > 5\"\n",
        )
        .unwrap();
        let config = Config::for_profile("");
        assert!(validate_rules(&config, Some(path)).is_err());
    }
}
