use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub scan: ScanConfig,
    pub feed: FeedConfig,
    pub llm: LlmConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LEXINEL_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("LEXINEL_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            scan: ScanConfig::from_env_profiled(p),
            feed: FeedConfig::from_env_profiled(p),
            llm: LlmConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:  {}:{} (cors={})", self.server.host, self.server.port, self.server.cors_origin);
        tracing::info!("  storage: data_dir={}, rules={}", self.storage.data_dir.display(), self.storage.rules_file.display());
        tracing::info!(
            "  dataset: {}",
            self.storage
                .transactions_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(bundled sample)".to_string())
        );
        tracing::info!("  scan:    delay={}ms, velocity_window={}h", self.scan.event_delay_ms, self.scan.velocity_window_hours);
        tracing::info!("  feed:    capacity={}, interval={}..{}ms", self.feed.capacity, self.feed.min_interval_ms, self.feed.max_interval_ms);
        tracing::info!("  llm:     provider={}, configured={}", self.llm.provider, self.llm.is_configured());
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "storage": {
                "data_dir": self.storage.data_dir,
                "rules_file": self.storage.rules_file,
                "transactions_file": self.storage.transactions_file,
            },
            "scan": {
                "event_delay_ms": self.scan.event_delay_ms,
                "velocity_window_hours": self.scan.velocity_window_hours,
            },
            "feed": {
                "capacity": self.feed.capacity,
                "min_interval_ms": self.feed.min_interval_ms,
                "max_interval_ms": self.feed.max_interval_ms,
            },
            "llm": {
                "provider": self.llm.provider,
                "configured": self.llm.is_configured(),
                "gemini_model": self.llm.gemini_model,
                "openai_model": self.llm.openai_model,
                "ollama": { "url": self.llm.ollama_url, "model": self.llm.ollama_model },
            },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 8000),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// YAML rule vault; created on first deploy.
    pub rules_file: PathBuf,
    /// JSON transaction array. `None` scans the bundled IBM AML sample.
    pub transactions_file: Option<PathBuf>,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        let data_dir = PathBuf::from(profiled_env_or(p, "DATA_DIR", "data"));
        let rules_file = profiled_env_opt(p, "RULES_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("rules.yml"));
        Self {
            data_dir,
            rules_file,
            transactions_file: profiled_env_opt(p, "TRANSACTIONS_FILE").map(PathBuf::from),
        }
    }
}

// ── Scan ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Pause between two streamed scan events.
    pub event_delay_ms: u64,
    /// Look-back window for same-beneficiary velocity counts.
    pub velocity_window_hours: u32,
}

impl ScanConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            event_delay_ms: profiled_env_u64(p, "SCAN_EVENT_DELAY_MS", 150),
            velocity_window_hours: profiled_env_u32(p, "VELOCITY_WINDOW_HOURS", 24),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            event_delay_ms: 150,
            velocity_window_hours: 24,
        }
    }
}

// ── Live feed ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub capacity: usize,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
}

impl FeedConfig {
    fn from_env_profiled(p: &str) -> Self {
        let min_interval_ms = profiled_env_u64(p, "FEED_MIN_INTERVAL_MS", 4000);
        Self {
            capacity: profiled_env_u32(p, "FEED_CAPACITY", 60) as usize,
            min_interval_ms,
            max_interval_ms: profiled_env_u64(p, "FEED_MAX_INTERVAL_MS", 7000).max(min_interval_ms),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: 60,
            min_interval_ms: 4000,
            max_interval_ms: 7000,
        }
    }
}

// ── LLM (Gemini / OpenAI / Ollama) ───────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "offline", "gemini", "openai", "ollama"
    pub provider: String,
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub ollama_url: String,
    pub ollama_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "LLM_PROVIDER", "offline").to_lowercase(),
            google_api_key: profiled_env_opt(p, "GOOGLE_API_KEY"),
            gemini_model: profiled_env_or(p, "GEMINI_MODEL", "gemini-2.5-pro"),
            openai_api_key: profiled_env_opt(p, "OPENAI_API_KEY"),
            openai_model: profiled_env_or(p, "OPENAI_MODEL", "gpt-4o"),
            openai_base_url: profiled_env_opt(p, "OPENAI_BASE_URL"),
            ollama_url: profiled_env_or(p, "OLLAMA_URL", "http://localhost:11434"),
            ollama_model: profiled_env_or(p, "OLLAMA_MODEL", "llama3.2"),
            temperature: profiled_env_or(p, "LLM_TEMPERATURE", "0.2")
                .parse()
                .unwrap_or(0.2),
            max_tokens: profiled_env_u32(p, "LLM_MAX_TOKENS", 2048),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "gemini" | "google" => self.google_api_key.is_some(),
            "openai" => self.openai_api_key.is_some(),
            "ollama" => true,
            _ => false,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "offline".to_string(),
            google_api_key: None,
            gemini_model: "gemini-2.5-pro".to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
            temperature: 0.2,
            max_tokens: 2048,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_provider_is_never_configured() {
        let llm = LlmConfig::default();
        assert!(!llm.is_configured());
    }

    #[test]
    fn gemini_requires_api_key() {
        let mut llm = LlmConfig {
            provider: "gemini".into(),
            ..LlmConfig::default()
        };
        assert!(!llm.is_configured());
        llm.google_api_key = Some("key".into());
        assert!(llm.is_configured());
    }

    #[test]
    fn redacted_summary_hides_secrets() {
        let mut config = Config::for_profile("LEXINEL_TEST_UNUSED");
        config.llm.google_api_key = Some("super-secret".into());
        let summary = config.redacted_summary().to_string();
        assert!(!summary.contains("super-secret"));
        assert_eq!(config.profile_label(), "LEXINEL_TEST_UNUSED");
    }
}
