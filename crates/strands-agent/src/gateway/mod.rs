//! Model gateway: one model call with retry, backoff and a deadline.
//!
//! `send` returns a lazy stream: nothing is requested until it is polled.
//! Transient failures are retried only while nothing has been forwarded
//! for the current attempt, so callers never see duplicated deltas.

mod retry;


use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::client::{
    InferenceConfig, ModelClient, ModelEvent, ModelEventStream, ModelRequest, ToolDefinition,
};
use crate::error::GatewayError;
use crate::{ResponseMetadata, ToolCallRequest, Turn};

pub use retry::{classify_http_error, classify_stream_error, from_reqwest, RetryPolicy};

/// What one model call produces, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    TextDelta(String),
    ToolCallRequested(ToolCallRequest),
    Metadata(ResponseMetadata),
    /// The model ended its turn; carries the full text.
    Completed(String),
    Failed(GatewayError),
}

pub type GatewayStream = Pin<Box<dyn Stream<Item = GatewayEvent> + Send>>;

pub struct ModelGateway {
    client: Arc<dyn ModelClient>,
    policy: RetryPolicy,
    system_prompt: Option<String>,
    inference: InferenceConfig,
    cache_system_prompt: bool,
    cache_documents: bool,
}

impl ModelGateway {
    pub fn new(client: Arc<dyn ModelClient>, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            system_prompt: None,
            inference: InferenceConfig::default(),
            cache_system_prompt: false,
            cache_documents: false,
        }
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_inference(mut self, inference: InferenceConfig) -> Self {
        self.inference = inference;
        self
    }

    pub fn with_prompt_cache(mut self, enabled: bool) -> Self {
        self.cache_system_prompt = enabled;
        self
    }

    /// Add a cache checkpoint after each attached document.
    pub fn with_document_cache(mut self, enabled: bool) -> Self {
        self.cache_documents = enabled;
        self
    }

    pub fn model_id(&self) -> &str {
        self.client.model_id()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Ask the model to respond to `history`, offering `tools`.
    ///
    /// A response that stops for tool use ends after its tool requests and
    /// metadata, without `Completed`. Every other stream ends with exactly
    /// one `Completed` or `Failed`.
    pub fn send(&self, history: Vec<Turn>, tools: Vec<ToolDefinition>) -> GatewayStream {
        let client = Arc::clone(&self.client);
        let policy = self.policy;
        let request = ModelRequest {
            system_prompt: self.system_prompt.clone(),
            history,
            tools,
            inference: self.inference,
            cache_system_prompt: self.cache_system_prompt,
            cache_documents: self.cache_documents,
        };

        let stream = async_stream::stream! {
            let deadline = Instant::now() + policy.request_timeout;
            let timed_out = GatewayError::Timeout(policy.request_timeout);
            let mut attempt = 0u32;

            debug!(
                model = %client.model_id(),
                turns = request.history.len(),
                tools = request.tools.len(),
                "Sending model request"
            );

            let (first, mut events) = loop {
                attempt += 1;
                let opened = match timeout_at(deadline, open(client.as_ref(), request.clone())).await {
                    Ok(opened) => opened,
                    Err(_) => {
                        warn!(attempt, "Model request deadline exceeded");
                        yield GatewayEvent::Failed(timed_out.clone());
                        return;
                    }
                };

                match opened {
                    Ok(pair) => break pair,
                    Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                        let delay = policy.delay_for(attempt);
                        if Instant::now() + delay >= deadline {
                            warn!(attempt, error = %err, "No time left to retry model request");
                            yield GatewayEvent::Failed(timed_out.clone());
                            return;
                        }
                        warn!(
                            attempt,
                            max_attempts = policy.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Transient model error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(err) => {
                        warn!(attempt, error = %err, "Model request failed");
                        yield GatewayEvent::Failed(err);
                        return;
                    }
                }
            };

            let mut text = String::new();
            let mut tool_calls = 0usize;
            let mut next = first;

            while let Some(event) = next {
                match event {
                    ModelEvent::TextDelta(delta) => {
                        text.push_str(&delta);
                        yield GatewayEvent::TextDelta(delta);
                    }
                    ModelEvent::ToolUse(call) => {
                        tool_calls += 1;
                        yield GatewayEvent::ToolCallRequested(call);
                    }
                    ModelEvent::Metadata(metadata) => {
                        yield GatewayEvent::Metadata(metadata);
                    }
                }

                next = match timeout_at(deadline, events.next()).await {
                    Err(_) => {
                        warn!("Model stream deadline exceeded");
                        yield GatewayEvent::Failed(timed_out.clone());
                        return;
                    }
                    Ok(Some(Ok(event))) => Some(event),
                    Ok(Some(Err(err))) => {
                        warn!(error = %err, "Model stream failed after output was forwarded");
                        yield GatewayEvent::Failed(err);
                        return;
                    }
                    Ok(None) => None,
                };
            }

            if tool_calls == 0 {
                info!(attempts = attempt, chars = text.len(), "Model turn completed");
                yield GatewayEvent::Completed(text);
            } else {
                debug!(attempts = attempt, tool_calls, "Model requested tools");
            }
        };

        Box::pin(stream)
    }
}

/// Invoke the client and pull the first event, so that failures before
/// any output can still be retried.
async fn open(
    client: &dyn ModelClient,
    request: ModelRequest,
) -> Result<(Option<ModelEvent>, ModelEventStream), GatewayError> {
    let mut events = client.invoke(request).await?;
    match events.next().await {
        Some(Ok(first)) => Ok((Some(first), events)),
        Some(Err(err)) => Err(err),
        None => Ok((None, events)),
    }
}
