//! Wires configuration into a ready `SessionController`.

use std::sync::Arc;

use strands_agent::tools::register_builtins;
use strands_agent::{
    AgentLoop, BedrockClient, BedrockConfig, ClaudeClient, ClaudeConfig, InferenceConfig,
    ModelClient, ModelGateway, RetryPolicy, ScriptedClient, SessionController, ToolRegistry,
};
use strands_common::StrandsError;
use strands_config::{ProviderKind, RetryConfig, StrandsConfig};

pub fn build_client(config: &StrandsConfig) -> Result<Arc<dyn ModelClient>, StrandsError> {
    let model = &config.model;
    let client: Arc<dyn ModelClient> = match model.provider {
        ProviderKind::Bedrock => {
            let bedrock = BedrockConfig::from_env(&model.region, &model.model_id)?;
            Arc::new(BedrockClient::new(bedrock)?)
        }
        ProviderKind::Claude => {
            let claude = ClaudeConfig::from_env()?.with_model(&model.model_id);
            Arc::new(ClaudeClient::new(claude)?)
        }
        ProviderKind::Scripted => Arc::new(ScriptedClient::demo()),
    };
    tracing::info!(provider = ?model.provider, model = client.model_id(), "Model client ready");
    Ok(client)
}

pub fn retry_policy(retry: &RetryConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: retry.max_attempts,
        base_delay: retry.base_delay(),
        max_delay: retry.max_delay(),
        request_timeout: retry.request_timeout(),
    }
}

pub fn build_registry(config: &StrandsConfig) -> Result<ToolRegistry, StrandsError> {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry, &config.agent.tools)?;
    tracing::info!(tools = ?registry.names(), "Tool registry loaded");
    Ok(registry)
}

pub fn build_controller(
    config: &StrandsConfig,
    client: Arc<dyn ModelClient>,
) -> Result<SessionController, StrandsError> {
    let registry = build_registry(config)?;

    let gateway = ModelGateway::new(client, retry_policy(&config.retry))
        .with_system_prompt(config.model.system_prompt().map(str::to_string))
        .with_inference(InferenceConfig {
            max_tokens: config.model.max_tokens,
            temperature: config.model.temperature,
        })
        .with_prompt_cache(config.model.cache_system_prompt)
        .with_document_cache(config.model.cache_documents);

    let agent = AgentLoop::new(Arc::new(gateway), Arc::new(registry))
        .with_max_tool_rounds(config.agent.max_tool_rounds);
    Ok(SessionController::new(agent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use strands_agent::AgentEvent;
    use strands_common::SessionId;

    fn scripted_config() -> StrandsConfig {
        let mut config = StrandsConfig::default();
        config.model.provider = ProviderKind::Scripted;
        config
    }

    #[test]
    fn retry_policy_from_config() {
        let policy = retry_policy(&RetryConfig::default());
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay.as_millis(), 500);
        assert_eq!(policy.request_timeout.as_secs(), 120);
    }

    #[test]
    fn unknown_tool_in_config_is_fatal() {
        let mut config = scripted_config();
        config.agent.tools.push("weather".into());
        let err = build_registry(&config).unwrap_err();
        assert!(err.to_string().contains("weather"));
    }

    #[tokio::test]
    async fn scripted_provider_answers_arithmetic() {
        let config = scripted_config();
        let client = Arc::new(ScriptedClient::new().with_echo_fallback());
        let controller = build_controller(&config, client).unwrap();
        assert_eq!(controller.agent().max_tool_rounds(), 8);

        let events: Vec<_> = controller
            .submit(&SessionId::from("t"), "6 * 7")
            .unwrap()
            .collect()
            .await;
        assert!(matches!(
            events.last(),
            Some(AgentEvent::Completed { text, .. }) if text == "The tool returned: 42"
        ));
    }
}
