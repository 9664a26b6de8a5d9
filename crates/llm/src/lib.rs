//! LLM access for the compliance console.
//!
//! Providers (Gemini, OpenAI-compatible, Ollama) sit behind [`LlmProvider`].
//! [`ComplianceAssistant`] wraps whichever one is configured and falls back
//! to the deterministic [`offline`] answers when none is.

pub mod assistant;
pub mod offline;
pub mod provider;
pub mod providers;

pub use assistant::{ChatAnswer, ComplianceAssistant, Narrative, OFFLINE_MODE};
pub use provider::{LlmError, LlmProvider, Message, Role};
