//! Agent loop configuration.

use serde::{Deserialize, Serialize};

/// Limits and tool selection for the orchestration loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum tool-call rounds per user turn (valid range: 1-64).
    pub max_tool_rounds: u32,
    /// Built-in tools to register at startup.
    pub tools: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 8,
            tools: vec!["calculator".into(), "current_time".into()],
        }
    }
}
