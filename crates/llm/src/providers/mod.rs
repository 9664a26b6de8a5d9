pub mod gemini;
pub mod ollama;
pub mod openai;

use lexinel_core::config::LlmConfig;

use crate::provider::{LlmError, LlmProvider};

/// Create the configured LLM provider.
///
/// `offline` (the default) is not a provider; callers fall back to the
/// deterministic responders when this returns `NotConfigured`.
pub fn create_provider(config: &LlmConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    match config.provider.as_str() {
        "gemini" | "google" => {
            let api_key = config
                .google_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("GOOGLE_API_KEY not set".into()))?;
            Ok(Box::new(gemini::GeminiProvider::new(
                api_key.clone(),
                config.gemini_model.clone(),
            )))
        }
        "openai" => {
            let api_key = config
                .openai_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("OPENAI_API_KEY not set".into()))?;
            let base_url = config
                .openai_base_url
                .as_deref()
                .unwrap_or("https://api.openai.com");
            Ok(Box::new(openai::OpenAiProvider::new(
                api_key.clone(),
                config.openai_model.clone(),
                base_url.to_string(),
            )))
        }
        "ollama" => Ok(Box::new(ollama::OllamaProvider::new(
            config.ollama_url.clone(),
            config.ollama_model.clone(),
        ))),
        "offline" | "" => Err(LlmError::NotConfigured("offline mode".into())),
        other => Err(LlmError::NotConfigured(format!("unknown LLM provider: '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_is_not_a_provider() {
        let config = LlmConfig::default();
        assert!(matches!(create_provider(&config), Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn gemini_needs_an_api_key() {
        let mut config = LlmConfig {
            provider: "gemini".into(),
            ..LlmConfig::default()
        };
        assert!(create_provider(&config).is_err());
        config.google_api_key = Some("key".into());
        assert_eq!(create_provider(&config).unwrap().name(), "gemini");
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = LlmConfig {
            provider: "ollama".into(),
            ..LlmConfig::default()
        };
        assert_eq!(create_provider(&config).unwrap().name(), "ollama");
    }
}
