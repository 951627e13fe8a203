//! The provider seam: one trait every model backend implements.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::{ResponseMetadata, Role, ToolCallRequest, Turn};

/// A tool as declared to the model provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceConfig {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.1,
        }
    }
}

/// Everything a provider needs for one model call.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub system_prompt: Option<String>,
    pub history: Vec<Turn>,
    pub tools: Vec<ToolDefinition>,
    pub inference: InferenceConfig,
    /// Mark the system prompt as a prompt-cache checkpoint.
    pub cache_system_prompt: bool,
    /// Add a prompt-cache checkpoint after each attached document.
    pub cache_documents: bool,
}

/// One item of a provider's response, already translated to local types.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    TextDelta(String),
    ToolUse(ToolCallRequest),
    Metadata(ResponseMetadata),
}

pub type ModelEventStream = Pin<Box<dyn Stream<Item = Result<ModelEvent, GatewayError>> + Send>>;

/// A remote (or scripted) model.
///
/// `invoke` resolves once the provider has accepted the request; the
/// returned stream then yields the response as it arrives. Errors from
/// `invoke` happen before any output and can be retried by the gateway.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn model_id(&self) -> &str;

    async fn invoke(&self, request: ModelRequest) -> Result<ModelEventStream, GatewayError>;
}

/// Which side of a provider conversation a turn lands on. Tool results
/// travel in user messages for both supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProviderRole {
    User,
    Assistant,
}

impl ProviderRole {
    pub(crate) fn of(role: Role) -> Self {
        match role {
            Role::User | Role::Tool => ProviderRole::User,
            Role::Assistant => ProviderRole::Assistant,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ProviderRole::User => "user",
            ProviderRole::Assistant => "assistant",
        }
    }
}

/// Stands in for a message whose turns produced no content blocks. Both
/// providers reject empty and whitespace-only text.
pub(crate) const EMPTY_MESSAGE_PLACEHOLDER: &str = "(no content)";

/// Providers accept at most four prompt-cache checkpoints per request.
pub(crate) const MAX_CACHE_POINTS: usize = 4;

/// Hands out the remaining cache checkpoints of one request, in order.
#[derive(Debug)]
pub(crate) struct CacheBudget {
    remaining: usize,
}

impl CacheBudget {
    pub(crate) fn new(used_by_system: bool) -> Self {
        Self {
            remaining: MAX_CACHE_POINTS - usize::from(used_by_system),
        }
    }

    pub(crate) fn take(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Group consecutive turns that map to the same provider role. Providers
/// require alternating roles, so a tool result followed by a user turn
/// must share one message.
pub(crate) fn merge_roles(history: &[Turn]) -> Vec<(ProviderRole, Vec<&Turn>)> {
    let mut groups: Vec<(ProviderRole, Vec<&Turn>)> = Vec::new();
    for turn in history {
        let role = ProviderRole::of(turn.role);
        match groups.last_mut() {
            Some((last, turns)) if *last == role => turns.push(turn),
            _ => groups.push((role, vec![turn])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolResult;

    #[test]
    fn merge_roles_joins_tool_results_and_user_turns() {
        let history = vec![
            Turn::user("what is 2+2?"),
            Turn::assistant_tool_calls(
                "",
                vec![ToolCallRequest::new("c1", "calculator", serde_json::json!({}))],
                None,
            ),
            Turn::tool(ToolResult::ok("c1", "4")),
            Turn::user("and 3+3?"),
            Turn::assistant("6", None),
        ];
        let groups = merge_roles(&history);
        let shape: Vec<_> = groups.iter().map(|(r, t)| (r.as_str(), t.len())).collect();
        assert_eq!(
            shape,
            vec![("user", 1), ("assistant", 1), ("user", 2), ("assistant", 1)]
        );
    }

    #[test]
    fn merge_roles_empty() {
        assert!(merge_roles(&[]).is_empty());
    }

    #[test]
    fn cache_budget_caps_checkpoints() {
        let mut budget = CacheBudget::new(true);
        let granted = (0..6).filter(|_| budget.take()).count();
        assert_eq!(granted, MAX_CACHE_POINTS - 1);

        let mut budget = CacheBudget::new(false);
        assert_eq!((0..6).filter(|_| budget.take()).count(), MAX_CACHE_POINTS);
    }

    #[test]
    fn inference_defaults() {
        let inference = InferenceConfig::default();
        assert_eq!(inference.max_tokens, 4096);
        assert!((inference.temperature - 0.1).abs() < f64::EPSILON);
    }
}
