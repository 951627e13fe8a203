//! ModelClient implementation for ClaudeClient (SSE streaming).

use std::time::Instant;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{ModelClient, ModelEvent, ModelEventStream, ModelRequest};
use crate::error::GatewayError;
use crate::gateway::{classify_http_error, classify_stream_error, from_reqwest};
use crate::streaming::{sse_events, SseEvent};
use crate::{ResponseMetadata, StopReason, ToolCallRequest};

use super::client::ClaudeClient;

#[async_trait]
impl ModelClient for ClaudeClient {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelEventStream, GatewayError> {
        let body = self.build_request_body(&request);
        let headers = self.auth_headers()?;

        debug!(
            model = %self.config.model,
            turns = request.history.len(),
            tools = request.tools.len(),
            "Claude API streaming request"
        );

        let started = Instant::now();
        let response = self
            .http
            .post(&self.config.api_url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &text));
        }

        let model = self.config.model.clone();
        let stream = async_stream::try_stream! {
            let mut decoder = ClaudeStreamDecoder::new(model, started);
            let mut events = Box::pin(sse_events(response));

            while let Some(event) = events.next().await {
                let event = event?;
                for decoded in decoder.decode(&event)? {
                    yield decoded;
                }
                if decoder.is_finished() {
                    break;
                }
            }

            if !decoder.is_finished() {
                warn!("Claude stream ended before message_stop");
                Err::<(), _>(GatewayError::Network("stream ended before message_stop".into()))?;
            }
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Debug)]
struct PendingToolUse {
    id: String,
    name: String,
    json: String,
}

/// Turns Messages API SSE events into [`ModelEvent`]s.
#[derive(Debug)]
pub struct ClaudeStreamDecoder {
    model: String,
    started: Instant,
    metadata: ResponseMetadata,
    pending_tool: Option<PendingToolUse>,
    finished: bool,
}

impl ClaudeStreamDecoder {
    pub fn new(model: impl Into<String>, started: Instant) -> Self {
        Self {
            model: model.into(),
            started,
            metadata: ResponseMetadata::default(),
            pending_tool: None,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn decode(&mut self, event: &SseEvent) -> Result<Vec<ModelEvent>, GatewayError> {
        let event_type = event.event.as_deref().unwrap_or("");
        if event_type == "ping" {
            return Ok(Vec::new());
        }

        let data: Value = serde_json::from_str(&event.data)
            .map_err(|e| GatewayError::Protocol(format!("invalid {event_type} payload: {e}")))?;

        let mut out = Vec::new();
        match event_type {
            "message_start" => {
                let usage = &data["message"]["usage"];
                self.metadata.usage.input_tokens = usage["input_tokens"].as_u64().unwrap_or(0);
                self.metadata.usage.cache_write_tokens =
                    usage["cache_creation_input_tokens"].as_u64().unwrap_or(0);
                self.metadata.usage.cache_read_tokens =
                    usage["cache_read_input_tokens"].as_u64().unwrap_or(0);
                if let Some(model) = data["message"]["model"].as_str() {
                    self.model = model.to_string();
                }
            }
            "content_block_start" => {
                let block = &data["content_block"];
                if block["type"] == "tool_use" {
                    self.pending_tool = Some(PendingToolUse {
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        json: String::new(),
                    });
                }
            }
            "content_block_delta" => match data["delta"]["type"].as_str().unwrap_or("") {
                "text_delta" => {
                    if let Some(text) = data["delta"]["text"].as_str() {
                        if !text.is_empty() {
                            out.push(ModelEvent::TextDelta(text.to_string()));
                        }
                    }
                }
                "input_json_delta" => {
                    if let (Some(tool), Some(part)) =
                        (self.pending_tool.as_mut(), data["delta"]["partial_json"].as_str())
                    {
                        tool.json.push_str(part);
                    }
                }
                _ => {}
            },
            "content_block_stop" => {
                if let Some(tool) = self.pending_tool.take() {
                    out.push(ModelEvent::ToolUse(finish_tool_use(tool)?));
                }
            }
            "message_delta" => {
                if let Some(reason) = data["delta"]["stop_reason"].as_str() {
                    self.metadata.stop_reason = Some(StopReason::from_provider(reason));
                }
                if let Some(output) = data["usage"]["output_tokens"].as_u64() {
                    self.metadata.usage.output_tokens = output;
                }
            }
            "message_stop" => {
                self.finished = true;
                let mut metadata = std::mem::take(&mut self.metadata);
                metadata.latency_ms = Some(self.started.elapsed().as_millis() as u64);
                metadata.model_id = Some(self.model.clone());
                out.push(ModelEvent::Metadata(metadata));
            }
            "error" => {
                let kind = data["error"]["type"].as_str().unwrap_or("error");
                let message = data["error"]["message"].as_str().unwrap_or("");
                return Err(classify_stream_error(kind, message));
            }
            other => debug!(event = other, "Ignoring Claude stream event"),
        }
        Ok(out)
    }
}

fn finish_tool_use(tool: PendingToolUse) -> Result<ToolCallRequest, GatewayError> {
    let arguments = if tool.json.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&tool.json).map_err(|e| {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sse(event: &str, data: Value) -> SseEvent {
        SseEvent {
            event: Some(event.to_string()),
            data: data.to_string(),
        }
    }

    fn decode_all(decoder: &mut ClaudeStreamDecoder, events: &[SseEvent]) -> Vec<ModelEvent> {
        events
            .iter()
            .flat_map(|e| decoder.decode(e).unwrap())
            .collect()
    }

    #[test]
    fn decodes_text_response() {
        let mut decoder = ClaudeStreamDecoder::new("claude", Instant::now());
        let events = decode_all(
            &mut decoder,
            &[
                sse(
                    "message_start",
                    json!({"message": {"model": "claude-x", "usage": {"input_tokens": 12, "cache_read_input_tokens": 5}}}),
                ),
                sse("content_block_start", json!({"content_block": {"type": "text", "text": ""}})),
                sse("ping", json!({})),
                sse("content_block_delta", json!({"delta": {"type": "text_delta", "text": "Hel"}})),
                sse("content_block_delta", json!({"delta": {"type": "text_delta", "text": "lo"}})),
                sse("content_block_stop", json!({})),
                sse("message_delta", json!({"delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 3}})),
                sse("message_stop", json!({})),
            ],
        );

        assert_eq!(events[0], ModelEvent::TextDelta("Hel".into()));
        assert_eq!(events[1], ModelEvent::TextDelta("lo".into()));
        let ModelEvent::Metadata(metadata) = &events[2] else {
            panic!("expected metadata, got {:?}", events[2]);
        };
        assert_eq!(metadata.usage.input_tokens, 12);
        assert_eq!(metadata.usage.output_tokens, 3);
        assert_eq!(metadata.usage.cache_read_tokens, 5);
        assert_eq!(metadata.stop_reason, Some(StopReason::EndTurn));
        assert_eq!(metadata.model_id.as_deref(), Some("claude-x"));
        assert!(metadata.latency_ms.is_some());
        assert!(decoder.is_finished());
    }

    #[test]
    fn decodes_tool_use() {
        let mut decoder = ClaudeStreamDecoder::new("claude", Instant::now());
        let events = decode_all(
            &mut decoder,
            &[
                sse(
                    "content_block_start",
                    json!({"content_block": {"type": "tool_use", "id": "toolu_1", "name": "calculator"}}),
                ),
                sse(
                    "content_block_delta",
                    json!({"delta": {"type": "input_json_delta", "partial_json": "{\"expression\":"}}),
                ),
                sse(
                    "content_block_delta",
                    json!({"delta": {"type": "input_json_delta", "partial_json": " \"2+2\"}"}}),
                ),
                sse("content_block_stop", json!({})),
            ],
        );
        assert_eq!(
            events,
            vec![ModelEvent::ToolUse(ToolCallRequest::new(
                "toolu_1",
                "calculator",
                json!({"expression": "2+2"})
            ))]
        );
        assert!(!decoder.is_finished());
    }

    #[test]
    fn empty_tool_input_becomes_empty_object() {
        let mut decoder = ClaudeStreamDecoder::new("claude", Instant::now());
        let events = decode_all(
            &mut decoder,
            &[
                sse(
                    "content_block_start",
                    json!({"content_block": {"type": "tool_use", "id": "toolu_2", "name": "current_time"}}),
                ),
                sse("content_block_stop", json!({})),
            ],
        );
        let ModelEvent::ToolUse(call) = &events[0] else {
            panic!("expected tool use");
        };
        assert_eq!(call.arguments, json!({}));
    }

    #[test]
    fn malformed_tool_input_is_protocol_error() {
        let mut decoder = ClaudeStreamDecoder::new("claude", Instant::now());
        decoder
            .decode(&sse(
                "content_block_start",
                json!({"content_block": {"type": "tool_use", "id": "t", "name": "calculator"}}),
            ))
            .unwrap();
        decoder
            .decode(&sse(
                "content_block_delta",
                json!({"delta": {"type": "input_json_delta", "partial_json": "{not json"}}),
            ))
            .unwrap();
        let err = decoder.decode(&sse("content_block_stop", json!({}))).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)));
    }

    #[test]
    fn error_event_is_classified() {
        let mut decoder = ClaudeStreamDecoder::new("claude", Instant::now());
        let err = decoder
            .decode(&sse(
                "error",
                json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
            ))
            .unwrap_err();
        assert!(matches!(err, GatewayError::ServiceUnavailable(_)));
    }

    #[test]
    fn invalid_json_payload() {
        let mut decoder = ClaudeStreamDecoder::new("claude", Instant::now());
        let event = SseEvent {
            event: Some("content_block_delta".into()),
            data: "{oops".into(),
        };
        assert!(matches!(decoder.decode(&event), Err(GatewayError::Protocol(_))));
    }
}
