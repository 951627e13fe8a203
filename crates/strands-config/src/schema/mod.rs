//! Configuration schema types for Strands.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults the chat app shipped with.

mod agent;
mod logging;
mod model;
mod retry;

pub use agent::*;
pub use logging::*;
pub use model::*;
pub use retry::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Strands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct StrandsConfig {
    pub model: ModelConfig,
    pub agent: AgentConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_matches_shipped_app() {
        let config = StrandsConfig::default();
        assert_eq!(config.model.provider, ProviderKind::Bedrock);
        assert_eq!(
            config.model.model_id,
            "global.anthropic.claude-sonnet-4-5-20250929-v1:0"
        );
        assert_eq!(config.model.region, "us-east-1");
        assert_eq!(config.model.max_tokens, 4096);
        assert!((config.model.temperature - 0.1).abs() < f64::EPSILON);
        assert!(!config.model.cache_system_prompt);
        assert!(!config.model.cache_documents);
    }

    #[test]
    fn default_agent_limits() {
        let config = StrandsConfig::default();
        assert_eq!(config.agent.max_tool_rounds, 8);
        assert_eq!(config.agent.tools, vec!["calculator", "current_time"]);
    }

    #[test]
    fn default_retry_policy() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.base_delay().as_millis(), 500);
        assert_eq!(retry.max_delay().as_millis(), 8_000);
        assert_eq!(retry.request_timeout().as_secs(), 120);
    }

    #[test]
    fn blank_system_prompt_is_none() {
        let mut model = ModelConfig::default();
        assert!(model.system_prompt().is_some());
        model.system_prompt = "   \n".into();
        assert_eq!(model.system_prompt(), None);
    }

    #[test]
    fn provider_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ProviderKind::Claude).unwrap();
        assert_eq!(json, "\"claude\"");
        let parsed: ProviderKind = serde_json::from_str("\"scripted\"").unwrap();
        assert_eq!(parsed, ProviderKind::Scripted);
    }

    #[test]
    fn log_level_directive() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert!(LogLevel::Debug.directive().contains("strands_agent=debug"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: StrandsConfig = toml::from_str(
            r#"
[model]
provider = "claude"
model_id = "claude-sonnet-4-20250514"
"#,
        )
        .unwrap();
        assert_eq!(config.model.provider, ProviderKind::Claude);
        assert_eq!(config.model.max_tokens, 4096);
        assert_eq!(config.agent.max_tool_rounds, 8);
    }
}
