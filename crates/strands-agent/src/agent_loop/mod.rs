//! The agent loop: call the model, run requested tools, feed results back,
//! until the model answers or a limit is hit.

mod state;


use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::error::LoopError;
use crate::gateway::{GatewayEvent, ModelGateway};
use crate::session::BusyGuard;
use crate::tools::ToolRegistry;
use crate::{ResponseMetadata, ToolOutput, ToolResult, ToolStatus, Turn, UserInput};

pub use state::LoopState;

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;

/// What a caller sees while a user turn is processed. Every stream ends
/// with exactly one terminal event: `Completed`, `Failed` or `Cancelled`.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    TextDelta(String),
    ToolCallStarted {
        call_id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolCallFinished {
        call_id: String,
        name: String,
        status: ToolStatus,
        output: ToolOutput,
    },
    Completed {
        text: String,
        metadata: Option<ResponseMetadata>,
    },
    Failed(LoopError),
    Cancelled,
}

impl AgentEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentEvent::Completed { .. } | AgentEvent::Failed(_) | AgentEvent::Cancelled
        )
    }
}

pub type AgentEventStream = Pin<Box<dyn Stream<Item = AgentEvent> + Send>>;

/// Shared, read-only loop configuration. Cheap to clone.
#[derive(Clone)]
pub struct AgentLoop {
    gateway: Arc<ModelGateway>,
    registry: Arc<ToolRegistry>,
    max_tool_rounds: u32,
}

impl AgentLoop {
    pub fn new(gateway: Arc<ModelGateway>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            gateway,
            registry,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn max_tool_rounds(&self) -> u32 {
        self.max_tool_rounds
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Process one user turn on the session held by `guard`.
    ///
    /// The returned stream is lazy. The session stays busy until the stream
    /// ends or is dropped. History is only written between model calls: the
    /// user turn first, then each assistant tool-call turn together with
    /// all of its tool results, then the final answer. A failure or a
    /// cancellation leaves the history as it was after the last write.
    pub fn run(&self, guard: BusyGuard, input: UserInput) -> AgentEventStream {
        let this = self.clone();

        let stream = async_stream::stream! {
            let guard = guard;
            let session = Arc::clone(guard.session());
            let mut state = LoopState::Idle;
            let mut rounds = 0u32;

            if session.is_cancelled() {
                state.transition(LoopState::Cancelled);
                yield AgentEvent::Cancelled;
                return;
            }

            info!(
                session = %session.id(),
                attachments = input.attachments.len(),
                "Processing user turn"
            );
            session.append(input.into_turn());

            loop {
                if session.is_cancelled() {
                    state.transition(LoopState::Cancelled);
                    yield AgentEvent::Cancelled;
                    return;
                }

                state.transition(LoopState::AwaitingModel);
                let mut events = this
                    .gateway
                    .send(session.snapshot(), this.registry.definitions());

                let mut text = String::new();
                let mut calls = Vec::new();
                let mut metadata: Option<ResponseMetadata> = None;

                while let Some(event) = events.next().await {
                    if session.is_cancelled() {
                        debug!(session = %session.id(), "Cancelled while streaming");
                        state.transition(LoopState::Cancelled);
                        yield AgentEvent::Cancelled;
                        return;
                    }

                    match event {
                        GatewayEvent::TextDelta(delta) => {
                            if state != LoopState::Streaming {
                                state.transition(LoopState::Streaming);
                            }
                            text.push_str(&delta);
                            yield AgentEvent::TextDelta(delta);
                        }
                        GatewayEvent::ToolCallRequested(call) => calls.push(call),
                        GatewayEvent::Metadata(meta) => {
                            let model = meta
                                .model_id
                                .clone()
                                .unwrap_or_else(|| this.gateway.model_id().to_string());
                            session.record_usage(&model, &meta.usage);
                            metadata = Some(meta);
                        }
                        GatewayEvent::Completed(full) => text = full,
                        GatewayEvent::Failed(err) => {
                            warn!(session = %session.id(), error = %err, "Model call failed");
                            state.transition(LoopState::Failed);
                            yield AgentEvent::Failed(LoopError::Gateway(err));
                            return;
                        }
                    }
                }

                if session.is_cancelled() {
                    state.transition(LoopState::Cancelled);
                    yield AgentEvent::Cancelled;
                    return;
                }

                if calls.is_empty() {
                    session.append(Turn::assistant(text.clone(), metadata.clone()));
                    state.transition(LoopState::Done);
                    info!(session = %session.id(), rounds, "User turn completed");
                    yield AgentEvent::Completed { text, metadata };
                    return;
                }

                rounds += 1;
                if rounds > this.max_tool_rounds {
                    warn!(
                        session = %session.id(),
                        max = this.max_tool_rounds,
                        "Tool-call iteration limit reached"
                    );
                    state.transition(LoopState::Failed);
                    yield AgentEvent::Failed(LoopError::IterationLimitExceeded {
                        rounds: this.max_tool_rounds,
                    });
                    return;
                }

                state.transition(LoopState::DispatchingTools);
                debug!(session = %session.id(), round = rounds, calls = calls.len(), "Dispatching tools");

                let mut batch = Vec::with_capacity(calls.len() + 1);
                batch.push(Turn::assistant_tool_calls(text, calls.clone(), metadata));

                for call in calls {
                    if session.is_cancelled() {
                        state.transition(LoopState::Cancelled);
                        yield AgentEvent::Cancelled;
                        return;
                    }

                    yield AgentEvent::ToolCallStarted {
                        call_id: call.call_id.clone(),
                        name: call.tool_name.clone(),
                        arguments: call.arguments.clone(),
                    };

                    let result = match this.registry.invoke(&call).await {
                        Ok(result) => result,
                        Err(err) => {
                            warn!(tool = %call.tool_name, error = %err, "Tool call rejected");
                            ToolResult::error(&call.call_id, err.to_string())
                        }
                    };

                    yield AgentEvent::ToolCallFinished {
                        call_id: call.call_id.clone(),
                        name: call.tool_name.clone(),
                        status: result.status,
                        output: result.output.clone(),
                    };
                    batch.push(Turn::tool(result));
                }

                if session.is_cancelled() {
                    state.transition(LoopState::Cancelled);
                    yield AgentEvent::Cancelled;
                    return;
                }
                session.append_batch(batch);
            }
        };

        Box::pin(stream)
    }
}
