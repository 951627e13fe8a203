//! Conversational agent core for Strands.
//!
//! Sits between a chat UI and a remote model:
//! - `ConversationStore`: append-only, ordered turn history
//! - `ToolRegistry`: named, schema-validated tool capabilities
//! - `ModelGateway`: provider translation, retry/backoff and request deadline
//! - `AgentLoop`: the call/dispatch/append state machine
//! - `SessionController`: one conversation per session id, busy and cancel handling
//!
//! Every user submission yields a lazy, finite stream of [`AgentEvent`]s.

pub mod agent_loop;
pub mod attachment;
pub mod bedrock;
pub mod claude;
pub mod client;
pub mod conversation;
pub mod error;
pub mod eventstream;
pub mod gateway;
pub mod scripted;
pub mod session;
pub mod streaming;
pub mod token_tracker;
pub mod tools;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use agent_loop::{AgentEvent, AgentEventStream, AgentLoop, LoopState};
pub use attachment::{Attachment, DocumentFormat, ImageFormat, UserInput};
pub use bedrock::{BedrockClient, BedrockConfig};
pub use claude::{ClaudeClient, ClaudeConfig};
pub use client::{InferenceConfig, ModelClient, ModelEvent, ModelRequest, ToolDefinition};
pub use conversation::ConversationStore;
pub use error::{AttachmentError, GatewayError, LoopError, RegistryError, SessionError};
pub use gateway::{GatewayEvent, ModelGateway, RetryPolicy};
pub use scripted::ScriptedClient;
pub use session::{Session, SessionController};
pub use token_tracker::TokenTracker;
pub use tools::{Tool, ToolError, ToolRegistry, ToolSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A model-issued request to run a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// What a tool produced: plain text or a structured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    Json(serde_json::Value),
}

impl ToolOutput {
    /// Render the output as the text a model will read.
    pub fn to_text(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(value: String) -> Self {
        ToolOutput::Text(value)
    }
}

impl From<&str> for ToolOutput {
    fn from(value: &str) -> Self {
        ToolOutput::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub output: ToolOutput,
    pub status: ToolStatus,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, output: impl Into<ToolOutput>) -> Self {
        Self {
            call_id: call_id.into(),
            output: output.into(),
            status: ToolStatus::Ok,
        }
    }

    pub fn error(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            output: ToolOutput::Text(message.into()),
            status: ToolStatus::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
    #[serde(default)]
    pub cache_write_tokens: u64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.cache_read_tokens = self.cache_read_tokens.saturating_add(other.cache_read_tokens);
        self.cache_write_tokens = self
            .cache_write_tokens
            .saturating_add(other.cache_write_tokens);
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    ContentFiltered,
    Other(String),
}

impl StopReason {
    /// Map a provider stop reason (`end_turn`, `tool_use`, `max_tokens`, ...).
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            "content_filtered" | "guardrail_intervened" | "refusal" => {
                StopReason::ContentFiltered
            }
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// Usage and timing reported alongside a model response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub usage: TokenUsage,
    pub latency_ms: Option<u64>,
    pub stop_reason: Option<StopReason>,
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnContent {
    Text {
        text: String,
    },
    ToolCalls {
        text: String,
        calls: Vec<ToolCallRequest>,
    },
    ToolResult {
        result: ToolResult,
    },
    /// A user message carrying images or documents.
    TextWithAttachments {
        text: String,
        attachments: Vec<Attachment>,
    },
}

/// One message in a conversation. Never edited once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text { text: text.into() },
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// A user turn with attachments; plain text when there are none.
    pub fn user_with_attachments(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        if attachments.is_empty() {
            return Self::user(text);
        }
        Self {
            role: Role::User,
            content: TurnContent::TextWithAttachments {
                text: text.into(),
                attachments,
            },
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn assistant(text: impl Into<String>, metadata: Option<ResponseMetadata>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text { text: text.into() },
            timestamp: Utc::now(),
            metadata,
        }
    }

    pub fn assistant_tool_calls(
        text: impl Into<String>,
        calls: Vec<ToolCallRequest>,
        metadata: Option<ResponseMetadata>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::ToolCalls {
                text: text.into(),
                calls,
            },
            timestamp: Utc::now(),
            metadata,
        }
    }

    pub fn tool(result: ToolResult) -> Self {
        Self {
            role: Role::Tool,
            content: TurnContent::ToolResult { result },
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Text carried by the turn (empty for tool results).
    pub fn text(&self) -> &str {
        match &self.content {
            TurnContent::Text { text }
            | TurnContent::ToolCalls { text, .. }
            | TurnContent::TextWithAttachments { text, .. } => text,
            TurnContent::ToolResult { .. } => "",
        }
    }

    pub fn attachments(&self) -> &[Attachment] {
        match &self.content {
            TurnContent::TextWithAttachments { attachments, .. } => attachments,
            _ => &[],
        }
    }

    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match &self.content {
            TurnContent::ToolCalls { calls, .. } => calls,
            _ => &[],
        }
    }

    pub fn tool_result(&self) -> Option<&ToolResult> {
        match &self.content {
            TurnContent::ToolResult { result } => Some(result),
            _ => None,
        }
    }
}
