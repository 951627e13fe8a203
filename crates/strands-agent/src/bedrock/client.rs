//! Bedrock client struct and ConverseStream request building.

use std::time::Duration;

use serde_json::{json, Value};

use crate::client::{
    merge_roles, CacheBudget, ModelRequest, ToolDefinition, EMPTY_MESSAGE_PLACEHOLDER,
};
use crate::error::GatewayError;
use crate::{Attachment, ToolOutput, Turn, TurnContent};

use super::config::BedrockConfig;

pub struct BedrockClient {
    pub(crate) config: BedrockConfig,
    pub(crate) http: reqwest::Client,
}

impl BedrockClient {
    pub fn new(config: BedrockConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(900))
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &BedrockConfig {
        &self.config
    }

    /// Build the JSON body for the `ConverseStream` API.
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
                // Converse rejects messages without content blocks.
                if content.is_empty() {
                    content.push(json!({ "text": EMPTY_MESSAGE_PLACEHOLDER }));
                }
                json!({ "role": role.as_str(), "content": content })
            })
            .collect();

        let mut body = json!({
            "messages": messages,
            "inferenceConfig": {
                "maxTokens": request.inference.max_tokens,
                "temperature": request.inference.temperature,
            },
        });

        if let Some(system) = request.system_prompt.as_deref() {
            let mut blocks = vec![json!({ "text": system })];
            if cache_system {
                blocks.push(json!({ "cachePoint": { "type": "default" } }));
            }
            body["system"] = json!(blocks);
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request.tools.iter().map(to_bedrock_tool).collect();
            body["toolConfig"] = json!({ "tools": tools });
        }

        body
    }
}

fn to_bedrock_tool(tool: &ToolDefinition) -> Value {
    json!({
        "toolSpec": {
            "name": tool.name,
            "description": tool.description,
            "inputSchema": { "json": tool.input_schema },
        }
    })
}

fn text_block(text: &str) -> Option<Value> {
    (!text.trim().is_empty()).then(|| json!({ "text": text }))
}

fn content_blocks(turn: &Turn, cache_documents: bool, cache: &mut CacheBudget) -> Vec<Value> {
    match &turn.content {
        TurnContent::Text { text } => text_block(text).into_iter().collect(),
        TurnContent::TextWithAttachments { text, attachments } => {
            let mut blocks = Vec::with_capacity(attachments.len() * 2 + 1);
            for attachment in attachments {
                blocks.push(attachment_block(attachment));
                let is_document = matches!(attachment, Attachment::Document { .. });
                if is_document && cache_documents && cache.take() {
                    blocks.push(json!({ "cachePoint": { "type": "default" } }));
                }
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
                    "toolUse": {
                        "toolUseId": call.call_id,
                        "name": call.tool_name,
                        "input": input,
                    }
                }));
            }
            blocks
        }
        TurnContent::ToolResult { result } => {
            let content = match &result.output {
                ToolOutput::Json(value) if value.is_object() => json!([{ "json": value }]),
                other => json!([{ "text": other.to_text() }]),
            };
            let status = if result.is_error() { "error" } else { "success" };
            vec![json!({
                "toolResult": {
                    "toolUseId": result.call_id,
                    "content": content,
                    "status": status,
                }
            })]
        }
    }
}

/// Blob members travel base64-encoded in the JSON protocol.
fn attachment_block(attachment: &Attachment) -> Value {
    match attachment {
        Attachment::Image { format, .. } => json!({
            "image": {
                "format": format.as_str(),
                "source": { "bytes": attachment.to_base64() },
            }
        }),
        Attachment::Document { format, name, .. } => json!({
            "document": {
                "format": format.as_str(),
                "name": name,
                "source": { "bytes": attachment.to_base64() },
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InferenceConfig;
    use crate::{DocumentFormat, ImageFormat, ToolCallRequest, ToolResult};

    fn client() -> BedrockClient {
        BedrockClient::new(BedrockConfig::new("key", "us-east-1", "model")).unwrap()
    }

    #[test]
    fn body_has_converse_shape() {
        let request = ModelRequest {
            system_prompt: Some("You are a helpful assistant.".into()),
            cache_system_prompt: true,
            history: vec![
                Turn::user("What is 2+2?"),
                Turn::assistant_tool_calls(
                    "",
                    vec![ToolCallRequest::new(
                        "tooluse_1",
                        "calculator",
                        json!({"expression": "2+2"}),
                    )],
                    None,
                ),
                Turn::tool(ToolResult::ok("tooluse_1", "4")),
            ],
            tools: vec![ToolDefinition {
                name: "calculator".into(),
                description: "math".into(),
                input_schema: json!({"type": "object"}),
            }],
            inference: InferenceConfig {
                max_tokens: 4096,
                temperature: 0.1,
            },
            cache_documents: false,
        };
        let body = client().build_request_body(&request);

        assert_eq!(body["system"][0]["text"], "You are a helpful assistant.");
        assert_eq!(body["system"][1]["cachePoint"]["type"], "default");
        assert_eq!(body["inferenceConfig"]["maxTokens"], 4096);
        assert_eq!(
            body["toolConfig"]["tools"][0]["toolSpec"]["inputSchema"]["json"]["type"],
            "object"
        );

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        let tool_use = &messages[1]["content"][0]["toolUse"];
        assert_eq!(tool_use["toolUseId"], "tooluse_1");
        assert_eq!(tool_use["input"]["expression"], "2+2");

        let tool_result = &messages[2]["content"][0]["toolResult"];
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(tool_result["status"], "success");
        assert_eq!(tool_result["content"][0]["text"], "4");
    }

    #[test]
    fn error_results_and_json_output() {
        let request = ModelRequest {
            history: vec![
                Turn::tool(ToolResult::error("a", "boom")),
                Turn::tool(ToolResult::ok("b", ToolOutput::Json(json!({"n": 1})))),
            ],
            ..Default::default()
        };
        let body = client().build_request_body(&request);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["toolResult"]["status"], "error");
        assert_eq!(content[1]["toolResult"]["content"][0]["json"]["n"], 1);
    }

    #[test]
    fn no_system_without_prompt_and_no_cache_point_when_disabled() {
        let request = ModelRequest {
            history: vec![Turn::user("hi")],
            ..Default::default()
        };
        let body = client().build_request_body(&request);
        assert!(body.get("system").is_none());
        assert!(body.get("toolConfig").is_none());

        let request = ModelRequest {
            system_prompt: Some("sys".into()),
            history: vec![Turn::user("hi")],
            ..Default::default()
        };
        let body = client().build_request_body(&request);
        assert_eq!(body["system"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn empty_assistant_text_gets_placeholder() {
        let request = ModelRequest {
            history: vec![Turn::user("hi"), Turn::assistant("", None)],
            ..Default::default()
        };
        let body = client().build_request_body(&request);
        assert_eq!(
            body["messages"][1]["content"][0]["text"],
            EMPTY_MESSAGE_PLACEHOLDER
        );

        let request = ModelRequest {
            history: vec![Turn::user("hi"), Turn::assistant("  \n", None)],
            ..Default::default()
        };
        let body = client().build_request_body(&request);
        let content = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["text"], EMPTY_MESSAGE_PLACEHOLDER);
    }

    fn report() -> Attachment {
        Attachment::document("Q3 report", DocumentFormat::Pdf, b"%PDF".to_vec())
    }

    #[test]
    fn attachments_precede_text_with_document_cache_points() {
        let turn = Turn::user_with_attachments(
            "Summarize these.",
            vec![
                Attachment::image(ImageFormat::Png, vec![1, 2, 3]),
                report(),
            ],
        );
        let request = ModelRequest {
            history: vec![turn],
            cache_documents: true,
            ..Default::default()
        };
        let body = client().build_request_body(&request);
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 4);

        assert_eq!(content[0]["image"]["format"], "png");
        assert_eq!(content[0]["image"]["source"]["bytes"], "AQID");
        assert_eq!(content[1]["document"]["format"], "pdf");
        assert_eq!(content[1]["document"]["name"], "Q3 report");
        assert_eq!(content[1]["document"]["source"]["bytes"], "JVBERg==");
        assert_eq!(content[2]["cachePoint"]["type"], "default");
        assert_eq!(content[3]["text"], "Summarize these.");
    }

    #[test]
    fn document_cache_points_respect_flag_and_limit() {
        let turn = Turn::user_with_attachments("read", vec![report()]);
        let request = ModelRequest {
            history: vec![turn],
            ..Default::default()
        };
        let body = client().build_request_body(&request);
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert!(content.iter().all(|block| block.get("cachePoint").is_none()));

        let turn = Turn::user_with_attachments("read", vec![report(); 5]);
        let request = ModelRequest {
            system_prompt: Some("sys".into()),
            cache_system_prompt: true,
            cache_documents: true,
            history: vec![turn],
            ..Default::default()
        };
        let body = client().build_request_body(&request);
        let content = body["messages"][0]["content"].as_array().unwrap();
        let points = content
            .iter()
            .filter(|block| block.get("cachePoint").is_some())
            .count();
        assert_eq!(points, 3);
        assert_eq!(body["system"][1]["cachePoint"]["type"], "default");
    }
}
