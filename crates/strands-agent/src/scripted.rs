//! Deterministic in-process model.
//!
//! `ScriptedClient` replays a queue of canned responses, one per model
//! call, and keeps the most recent requests it received. With the echo fallback
//! enabled it keeps answering once the queue is empty, which makes it
//! usable as an offline demo provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::client::{ModelClient, ModelEvent, ModelEventStream, ModelRequest};
use crate::error::GatewayError;
use crate::{ResponseMetadata, Role, StopReason, TokenUsage, ToolCallRequest, Turn};

/// One scripted model call.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Stream these text chunks, then request these tools (if any).
    Reply {
        chunks: Vec<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
    /// Fail before producing any output.
    Fail(GatewayError),
    /// Stream these chunks, then fail.
    FailMidStream {
        chunks: Vec<String>,
        error: GatewayError,
    },
}

/// Requests kept by [`ScriptedClient::new`].
pub const DEFAULT_REQUEST_LOG: usize = 16;

pub struct ScriptedClient {
    model_id: String,
    steps: Mutex<VecDeque<ScriptStep>>,
    requests: Mutex<VecDeque<ModelRequest>>,
    request_log: usize,
    invocations: AtomicUsize,
    echo_fallback: bool,
    response_delay: Duration,
    chunk_delay: Duration,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            model_id: "scripted".to_string(),
            steps: Mutex::new(VecDeque::new()),
            requests: Mutex::new(VecDeque::new()),
            request_log: DEFAULT_REQUEST_LOG,
            invocations: AtomicUsize::new(0),
            echo_fallback: false,
            response_delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
        }
    }

    /// Offline demo model: answers arithmetic with the calculator tool,
    /// time questions with `current_time`, and echoes everything else.
    pub fn demo() -> Self {
        Self::new()
            .with_echo_fallback()
            .with_chunk_delay(Duration::from_millis(20))
            .with_request_log(0)
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Keep at most `limit` recent requests; zero keeps none.
    pub fn with_request_log(mut self, limit: usize) -> Self {
        self.request_log = limit;
        self
    }

    pub fn with_echo_fallback(mut self) -> Self {
        self.echo_fallback = true;
        self
    }

    /// Wait this long before accepting each request.
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Wait this long before each streamed chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn then(self, step: ScriptStep) -> Self {
        lock(&self.steps).push_back(step);
        self
    }

    /// A final text answer, streamed word by word.
    pub fn then_text(self, text: &str) -> Self {
        self.then(ScriptStep::Reply {
            chunks: split_chunks(text),
            tool_calls: Vec::new(),
        })
    }

    /// A response that requests one tool.
    pub fn then_tool_call(self, name: &str, arguments: serde_json::Value) -> Self {
        let call = ToolCallRequest::new(strands_common::new_call_id(), name, arguments);
        self.then_tool_calls("", vec![call])
    }

    /// A response with preamble text that requests several tools.
    pub fn then_tool_calls(self, text: &str, calls: Vec<ToolCallRequest>) -> Self {
        self.then(ScriptStep::Reply {
            chunks: split_chunks(text),
            tool_calls: calls,
        })
    }

    pub fn then_error(self, error: GatewayError) -> Self {
        self.then(ScriptStep::Fail(error))
    }

    pub fn then_stream_error(self, text: &str, error: GatewayError) -> Self {
        self.then(ScriptStep::FailMidStream {
            chunks: split_chunks(text),
            error,
        })
    }

    /// The most recent requests, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        lock(&self.requests).iter().cloned().collect()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn remaining_steps(&self) -> usize {
        lock(&self.steps).len()
    }

    fn record(&self, request: ModelRequest) {
        if self.request_log == 0 {
            return;
        }
        let mut requests = lock(&self.requests);
        if requests.len() == self.request_log {
            requests.pop_front();
        }
        requests.push_back(request);
    }

    fn next_step(&self, request: &ModelRequest) -> Result<ScriptStep, GatewayError> {
        if let Some(step) = lock(&self.steps).pop_front() {
            return Ok(step);
        }
        if self.echo_fallback {
            return Ok(echo_step(&request.history));
        }
        Err(GatewayError::Protocol("scripted client has no steps left".into()))
    }
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelEventStream, GatewayError> {
        let started = Instant::now();
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step(&request);
        let input_tokens = estimate_tokens(request.history.iter().map(Turn::text));
        self.record(request);

        if !self.response_delay.is_zero() {
            tokio::time::sleep(self.response_delay).await;
        }

        let (chunks, tool_calls, failure) = match step? {
            ScriptStep::Fail(error) => {
                debug!(error = %error, "Scripted invoke failure");
                return Err(error);
            }
            ScriptStep::Reply { chunks, tool_calls } => (chunks, tool_calls, None),
            ScriptStep::FailMidStream { chunks, error } => (chunks, Vec::new(), Some(error)),
        };

        let chunk_delay = self.chunk_delay;
        let model_id = self.model_id.clone();
        let stream = async_stream::stream! {
            for chunk in &chunks {
                if !chunk_delay.is_zero() {
                    tokio::time::sleep(chunk_delay).await;
                }
                yield Ok(ModelEvent::TextDelta(chunk.clone()));
            }
            if let Some(error) = failure {
                yield Err(error);
                return;
            }
            let stop_reason = if tool_calls.is_empty() {
                StopReason::EndTurn
            } else {
                StopReason::ToolUse
            };
            for call in tool_calls {
                yield Ok(ModelEvent::ToolUse(call));
            }
            yield Ok(ModelEvent::Metadata(ResponseMetadata {
                usage: TokenUsage {
                    input_tokens,
                    output_tokens: estimate_tokens(chunks.iter().map(String::as_str)),
                    ..Default::default()
                },
                latency_ms: Some(started.elapsed().as_millis() as u64),
                stop_reason: Some(stop_reason),
                model_id: Some(model_id),
            }));
        };

        Ok(Box::pin(stream))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Split text into word chunks, keeping the separating spaces.
fn split_chunks(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(String::from).collect()
}

/// Rough count: four characters per token.
fn estimate_tokens<'a>(texts: impl Iterator<Item = &'a str>) -> u64 {
    let chars: usize = texts.map(|t| t.chars().count()).sum();
    chars.div_ceil(4) as u64
}

fn echo_step(history: &[Turn]) -> ScriptStep {
    let reply = |text: String| ScriptStep::Reply {
        chunks: split_chunks(&text),
        tool_calls: Vec::new(),
    };
    let call = |name: &str, arguments: serde_json::Value| ScriptStep::Reply {
        chunks: Vec::new(),
        tool_calls: vec![ToolCallRequest::new(
            strands_common::new_call_id(),
            name,
            arguments,
        )],
    };

    let Some(last) = history.last() else {
        return reply("Hello! Ask me anything.".to_string());
    };

    if last.role == Role::Tool {
        let mut outputs: Vec<String> = history
            .iter()
            .rev()
            .take_while(|t| t.role == Role::Tool)
            .filter_map(|t| t.tool_result().map(|r| r.output.to_text()))
            .collect();
        outputs.reverse();
        return reply(format!("The tool returned: {}", outputs.join(", ")));
    }

    let text = last.text().trim();
    if looks_like_arithmetic(text) {
        return call("calculator", json!({ "expression": text }));
    }
    if text.to_ascii_lowercase().contains("time") {
        return call("current_time", json!({}));
    }
    let attachments = last.attachments();
    if !attachments.is_empty() {
        let labels: Vec<String> = attachments.iter().map(|a| a.label()).collect();
        return reply(format!("You said: {text} (attached: {})", labels.join(", ")));
    }
    reply(format!("You said: {text}"))
}

fn looks_like_arithmetic(text: &str) -> bool {
    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    let has_operator = text.chars().any(|c| "+-*/%^".contains(c));
    let all_math = text
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || "+-*/%^().".contains(c));
    has_digit && has_operator && all_math
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolResult;
    use futures_util::StreamExt;

    async fn collect(client: &ScriptedClient, history: Vec<Turn>) -> Vec<Result<ModelEvent, GatewayError>> {
        let request = ModelRequest {
            history,
            ..Default::default()
        };
        match client.invoke(request).await {
            Ok(stream) => stream.collect().await,
            Err(e) => vec![Err(e)],
        }
    }

    #[tokio::test]
    async fn replays_steps_in_order() {
        let client = ScriptedClient::new()
            .then_tool_call("calculator", json!({"expression": "2+2"}))
            .then_text("The answer is 4");

        let first = collect(&client, vec![Turn::user("2+2?")]).await;
        assert!(matches!(first[0], Ok(ModelEvent::ToolUse(ref c)) if c.tool_name == "calculator"));
        let Ok(ModelEvent::Metadata(meta)) = first.last().unwrap() else {
            panic!("expected metadata last");
        };
        assert_eq!(meta.stop_reason, Some(StopReason::ToolUse));

        let second = collect(&client, vec![Turn::user("2+2?")]).await;
        let text: String = second
            .iter()
            .filter_map(|e| match e {
                Ok(ModelEvent::TextDelta(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "The answer is 4");

        assert_eq!(client.invocation_count(), 2);
        assert_eq!(client.requests().len(), 2);
        assert_eq!(client.remaining_steps(), 0);
    }

    #[tokio::test]
    async fn exhausted_script_is_protocol_error() {
        let client = ScriptedClient::new();
        let events = collect(&client, vec![Turn::user("hi")]).await;
        assert!(matches!(events[0], Err(GatewayError::Protocol(_))));
    }

    #[tokio::test]
    async fn invoke_failure_and_mid_stream_failure() {
        let client = ScriptedClient::new()
            .then_error(GatewayError::RateLimited("slow down".into()))
            .then_stream_error("partial", GatewayError::Network("reset".into()));

        let events = collect(&client, vec![Turn::user("hi")]).await;
        assert_eq!(events, vec![Err(GatewayError::RateLimited("slow down".into()))]);

        let events = collect(&client, vec![Turn::user("hi")]).await;
        assert_eq!(
            events,
            vec![
                Ok(ModelEvent::TextDelta("partial".into())),
                Err(GatewayError::Network("reset".into())),
            ]
        );
    }

    #[tokio::test]
    async fn echo_fallback_routes_to_tools() {
        let client = ScriptedClient::new().with_echo_fallback();

        let events = collect(&client, vec![Turn::user("12 * 3")]).await;
        assert!(matches!(
            events[0],
            Ok(ModelEvent::ToolUse(ref c)) if c.tool_name == "calculator" && c.arguments["expression"] == "12 * 3"
        ));

        let events = collect(&client, vec![Turn::user("what time is it?")]).await;
        assert!(matches!(events[0], Ok(ModelEvent::ToolUse(ref c)) if c.tool_name == "current_time"));

        let events = collect(
            &client,
            vec![Turn::user("12 * 3"), Turn::tool(ToolResult::ok("c", "36"))],
        )
        .await;
        assert_eq!(events[0], Ok(ModelEvent::TextDelta("The ".into())));

        let events = collect(&client, vec![Turn::user("hello there")]).await;
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                Ok(ModelEvent::TextDelta(t)) => Some(t.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "You said: hello there");
    }

    #[tokio::test]
    async fn request_log_keeps_only_recent_requests() {
        let client = ScriptedClient::new().with_echo_fallback().with_request_log(2);
        for text in ["one", "two", "three"] {
            collect(&client, vec![Turn::user(text)]).await;
        }
        let seen: Vec<String> = client
            .requests()
            .iter()
            .map(|r| r.history[0].text().to_string())
            .collect();
        assert_eq!(seen, vec!["two", "three"]);
        assert_eq!(client.invocation_count(), 3);

        let demo = ScriptedClient::demo().with_chunk_delay(Duration::ZERO);
        for _ in 0..DEFAULT_REQUEST_LOG + 1 {
            collect(&demo, vec![Turn::user("hello")]).await;
        }
        assert!(demo.requests().is_empty());
        assert_eq!(demo.invocation_count(), DEFAULT_REQUEST_LOG + 1);
    }

    #[tokio::test]
    async fn echo_mentions_attachments() {
        let client = ScriptedClient::new().with_echo_fallback();
        let turn = Turn::user_with_attachments(
            "look",
            vec![crate::Attachment::image(crate::ImageFormat::Png, vec![0])],
        );
        let events = collect(&client, vec![turn]).await;
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                Ok(ModelEvent::TextDelta(t)) => Some(t.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "You said: look (attached: png image)");
    }

    #[test]
    fn arithmetic_detection() {
        assert!(looks_like_arithmetic("2+2"));
        assert!(looks_like_arithmetic("(3 * 4) / 2"));
        assert!(!looks_like_arithmetic("42"));
        assert!(!looks_like_arithmetic("what is 2+2"));
    }

    #[test]
    fn chunks_keep_spaces() {
        assert_eq!(split_chunks("a bc d"), vec!["a ", "bc ", "d"]);
        assert!(split_chunks("").is_empty());
    }
}
