//! Claude API client struct and request building.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue};
use serde_json::{json, Value};
use tracing::warn;

use crate::client::{
    merge_roles, CacheBudget, ModelRequest, ToolDefinition, EMPTY_MESSAGE_PLACEHOLDER,
};
use crate::error::GatewayError;
use crate::{Attachment, DocumentFormat, Turn, TurnContent};

use super::config::{AuthMethod, ClaudeConfig};

pub(crate) const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude API client.
pub struct ClaudeClient {
    pub(crate) config: ClaudeConfig,
    pub(crate) http: reqwest::Client,
}

impl ClaudeClient {
    pub fn new(config: ClaudeConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(900))
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClaudeConfig {
        &self.config
    }

    /// Build auth headers for the configured auth method.
    pub(crate) fn auth_headers(&self) -> Result<HeaderMap, GatewayError> {
        let invalid = |_: InvalidHeaderValue| {
            GatewayError::Unauthorized("credential contains invalid characters".into())
        };

        let mut headers = HeaderMap::new();
        match self.config.auth_method {
            AuthMethod::ApiKey => {
                let key = HeaderValue::from_str(&self.config.token).map_err(invalid)?;
                headers.insert("x-api-key", key);
            }
            AuthMethod::OAuth => {
                let bearer = format!("Bearer {}", self.config.token);
                let value = HeaderValue::from_str(&bearer).map_err(invalid)?;
                headers.insert("authorization", value);
            }
        }
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        Ok(headers)
    }

    /// Build the JSON request body for the Messages API.
    pub(crate) fn build_request_body(&self, request: &ModelRequest) -> Value {
        let cache_system = request.cache_system_prompt && request.system_prompt.is_some();
        let mut cache = CacheBudget::new(cache_system);
        let cache_documents = request.cache_documents;

        let messages: Vec<Value> = merge_roles(&request.history)
            .into_iter()
            .map(|(role, turns)| {
                let mut content: Vec<Value> = Vec::new();
                for turn in turns {
                    content.extend(content_blocks(turn, cache_documents, &mut cache));
                }
                // The API rejects messages without content.
                if content.is_empty() {
                    content.push(json!({ "type": "text", "text": EMPTY_MESSAGE_PLACEHOLDER }));
                }
                json!({ "role": role.as_str(), "content": content })
            })
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": request.inference.max_tokens,
            "temperature": request.inference.temperature,
            "messages": messages,
            "stream": true,
        });

        if let Some(system) = request.system_prompt.as_deref() {
            body["system"] = if cache_system {
                json!([{
                    "type": "text",
                    "text": system,
                    "cache_control": { "type": "ephemeral" }
                }])
            } else {
                json!(system)
            };
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request.tools.iter().map(to_claude_tool).collect();
            body["tools"] = json!(tools);
        }

        body
    }
}

fn to_claude_tool(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

fn text_block(text: &str) -> Option<Value> {
    (!text.trim().is_empty()).then(|| json!({ "type": "text", "text": text }))
}

fn content_blocks(turn: &Turn, cache_documents: bool, cache: &mut CacheBudget) -> Vec<Value> {
    match &turn.content {
        TurnContent::Text { text } => text_block(text).into_iter().collect(),
        TurnContent::TextWithAttachments { text, attachments } => {
            let mut blocks = Vec::with_capacity(attachments.len() + 1);
            for attachment in attachments {
                let mut block = attachment_block(attachment);
                let is_document = block["type"] == "document";
                if is_document && cache_documents && cache.take() {
                    block["cache_control"] = json!({ "type": "ephemeral" });
                }
                blocks.push(block);
            }
            blocks.extend(text_block(text));
            blocks
        }
        TurnContent::ToolCalls { text, calls } => {
            let mut blocks = Vec::with_capacity(calls.len() + 1);
            blocks.extend(text_block(text));
            for call in calls {
                let input = if call.arguments.is_null() {
                    json!({})
                } else {
                    call.arguments.clone()
                };
                blocks.push(json!({
                    "type": "tool_use",
                    "id": call.call_id,
                    "name": call.tool_name,
                    "input": input,
                }));
            }
            blocks
        }
        TurnContent::ToolResult { result } => vec![json!({
            "type": "tool_result",
            "tool_use_id": result.call_id,
            "content": result.output.to_text(),
            "is_error": result.is_error(),
        })],
    }
}

/// The Messages API reads images, PDFs and plain text. Office formats
/// are replaced by a note so the model knows something was attached.
fn attachment_block(attachment: &Attachment) -> Value {
    match attachment {
        Attachment::Image { format, .. } => json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": format.mime_type(),
                "data": attachment.to_base64(),
            }
        }),
        Attachment::Document { format, name, bytes } if format.is_text() => json!({
            "type": "document",
            "title": name,
            "source": {
                "type": "text",
                "media_type": "text/plain",
                "data": String::from_utf8_lossy(bytes),
            }
        }),
        Attachment::Document { format: DocumentFormat::Pdf, name, .. } => json!({
            "type": "document",
            "title": name,
            "source": {
                "type": "base64",
                "media_type": "application/pdf",
                "data": attachment.to_base64(),
            }
        }),
        Attachment::Document { .. } => {
            let label = attachment.label();
            warn!(attachment = %label, "Claude cannot read this document format");
            json!({
                "type": "text",
                "text": format!("[attached {label}: format not readable by this model]"),
            })
        }
    }
}
