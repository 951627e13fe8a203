//! ModelClient implementation for BedrockClient (`ConverseStream`).

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{ModelClient, ModelEvent, ModelEventStream, ModelRequest};
use crate::error::GatewayError;
use crate::eventstream::{event_stream_messages, EventStreamMessage};
use crate::gateway::{classify_http_error, classify_stream_error, from_reqwest};
use crate::{ResponseMetadata, StopReason, ToolCallRequest};

use super::client::BedrockClient;

#[async_trait]
impl ModelClient for BedrockClient {
    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelEventStream, GatewayError> {
        let body = self.build_request_body(&request);
        let url = self.config.converse_stream_url();

        debug!(
            model = %self.config.model_id,
            region = %self.config.region,
            turns = request.history.len(),
            "Bedrock ConverseStream request"
        );

        let started = Instant::now();
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("accept", "application/vnd.amazon.eventstream")
            .json(&body)
            .send()
            .await
            .map_err(|e| from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_type = response
                .headers()
                .get("x-amzn-errortype")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(':').next().unwrap_or(v).to_string());
            let text = response.text().await.unwrap_or_default();
            let text = match error_type {
                Some(kind) => format!("{kind}: {text}"),
                None => text,
            };
            return Err(classify_http_error(status.as_u16(), &text));
        }

        let model_id = self.config.model_id.clone();
        let stream = async_stream::try_stream! {
            let mut decoder = ConverseStreamDecoder::new(model_id, started);
            let mut messages = Box::pin(event_stream_messages(response));

            while let Some(message) = messages.next().await {
                let message = message?;
                for decoded in decoder.decode(&message)? {
                    yield decoded;
                }
                if decoder.is_finished() {
                    break;
                }
            }

            if !decoder.is_finished() {
                match decoder.finish() {
                    Some(metadata) => yield metadata,
                    None => {
                        warn!("Bedrock stream ended before messageStop");
                        Err::<(), _>(GatewayError::Network("stream ended before messageStop".into()))?;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Debug)]
struct PendingToolUse {
    id: String,
    name: String,
    input: String,
}

/// Turns `ConverseStream` event messages into [`ModelEvent`]s.
///
/// Text deltas pass straight through. Tool input arrives as JSON string
/// fragments per content block and is parsed when the block stops. The
/// trailing `metadata` event ends the response.
#[derive(Debug)]
pub struct ConverseStreamDecoder {
    model: String,
    started: Instant,
    pending_tools: HashMap<u64, PendingToolUse>,
    stop_reason: Option<StopReason>,
    finished: bool,
}

impl ConverseStreamDecoder {
    pub fn new(model: impl Into<String>, started: Instant) -> Self {
        Self {
            model: model.into(),
            started,
            pending_tools: HashMap::new(),
            stop_reason: None,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn decode(&mut self, message: &EventStreamMessage) -> Result<Vec<ModelEvent>, GatewayError> {
        match message.message_type() {
            Some("exception") => {
                let kind = message.exception_type().unwrap_or("exception");
                let payload: Value = serde_json::from_slice(&message.payload).unwrap_or_default();
                let text = payload["message"]
                    .as_str()
                    .or_else(|| payload["Message"].as_str())
                    .unwrap_or("");
                return Err(classify_stream_error(kind, text));
            }
            Some("error") => {
                let kind = message.header(":error-code").unwrap_or("error");
                let text = message.header(":error-message").unwrap_or("");
                return Err(classify_stream_error(kind, text));
            }
            _ => {}
        }

        let event_type = message.event_type().unwrap_or("");
        let data: Value = serde_json::from_slice(&message.payload)
            .map_err(|e| GatewayError::Protocol(format!("invalid {event_type} payload: {e}")))?;
        let index = data["contentBlockIndex"].as_u64().unwrap_or(0);

        let mut out = Vec::new();
        match event_type {
            "messageStart" => {}
            "contentBlockStart" => {
                let tool_use = &data["start"]["toolUse"];
                if let Some(name) = tool_use["name"].as_str() {
                    self.pending_tools.insert(
                        index,
                        PendingToolUse {
                            id: tool_use["toolUseId"].as_str().unwrap_or_default().to_string(),
                            name: name.to_string(),
                            input: String::new(),
                        },
                    );
                }
            }
            "contentBlockDelta" => {
                let delta = &data["delta"];
                if let Some(text) = delta["text"].as_str() {
                    if !text.is_empty() {
                        out.push(ModelEvent::TextDelta(text.to_string()));
                    }
                } else if let Some(part) = delta["toolUse"]["input"].as_str() {
                    if let Some(tool) = self.pending_tools.get_mut(&index) {
                        tool.input.push_str(part);
                    }
                }
            }
            "contentBlockStop" => {
                if let Some(tool) = self.pending_tools.remove(&index) {
                    out.push(ModelEvent::ToolUse(finish_tool_use(tool)?));
                }
            }
            "messageStop" => {
                self.stop_reason = data["stopReason"].as_str().map(StopReason::from_provider);
            }
            "metadata" => {
                self.finished = true;
                let usage = &data["usage"];
                let mut metadata = self.base_metadata();
                metadata.usage.input_tokens = usage["inputTokens"].as_u64().unwrap_or(0);
                metadata.usage.output_tokens = usage["outputTokens"].as_u64().unwrap_or(0);
                metadata.usage.cache_read_tokens =
                    usage["cacheReadInputTokens"].as_u64().unwrap_or(0);
                metadata.usage.cache_write_tokens =
                    usage["cacheWriteInputTokens"].as_u64().unwrap_or(0);
                if let Some(latency) = data["metrics"]["latencyMs"].as_u64() {
                    metadata.latency_ms = Some(latency);
                }
                out.push(ModelEvent::Metadata(metadata));
            }
            other => debug!(event = other, "Ignoring Bedrock stream event"),
        }
        Ok(out)
    }

    /// Metadata for a stream that stopped without its `metadata` event.
    /// `None` unless `messageStop` was seen.
    pub fn finish(&mut self) -> Option<ModelEvent> {
        if self.finished || self.stop_reason.is_none() {
            return None;
        }
        self.finished = true;
        Some(ModelEvent::Metadata(self.base_metadata()))
    }

    fn base_metadata(&self) -> ResponseMetadata {
        ResponseMetadata {
            latency_ms: Some(self.started.elapsed().as_millis() as u64),
            stop_reason: self.stop_reason.clone(),
            model_id: Some(self.model.clone()),
            ..Default::default()
        }
    }
}

fn finish_tool_use(tool: PendingToolUse) -> Result<ToolCallRequest, GatewayError> {
    let arguments = if tool.input.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&tool.input).map_err(|e| {
            GatewayError::Protocol(format!("invalid tool input for {}: {e}", tool.name))
        })?
    };
    let call_id = if tool.id.is_empty() {
        strands_common::new_call_id()
    } else {
        tool.id
    };
    Ok(ToolCallRequest::new(call_id, tool.name, arguments))
}
