//! Model provider configuration.

use serde::{Deserialize, Serialize};

/// Which remote (or in-process) model backend to talk to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum ProviderKind {
    /// AWS Bedrock Runtime `ConverseStream` API.
    #[default]
    Bedrock,
    /// Anthropic Messages API.
    Claude,
    /// Canned in-process responses, no network.
    Scripted,
}

/// Model selection and inference parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: ProviderKind,
    pub model_id: String,
    /// AWS region, only used by the Bedrock provider.
    pub region: String,
    /// Valid range: 1-65536.
    pub max_tokens: u32,
    /// Valid range: 0.0-1.0.
    pub temperature: f64,
    /// Empty string disables the system prompt.
    pub system_prompt: String,
    /// Ask the provider to cache the system prompt between requests.
    pub cache_system_prompt: bool,
    /// Add a cache checkpoint after each attached document.
    pub cache_documents: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Bedrock,
            model_id: "global.anthropic.claude-sonnet-4-5-20250929-v1:0".into(),
            region: "us-east-1".into(),
            max_tokens: 4096,
            temperature: 0.1,
            system_prompt: "You are a helpful assistant. Be concise and friendly.".into(),
            cache_system_prompt: false,
            cache_documents: false,
        }
    }
}

impl ModelConfig {
    /// The system prompt, or `None` when it is blank.
    pub fn system_prompt(&self) -> Option<&str> {
        let trimmed = self.system_prompt.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}
