//! Anthropic Claude API client.
//!
//! Implements [`ModelClient`](crate::ModelClient) for Claude models via the
//! Anthropic Messages API (https://api.anthropic.com/v1/messages), streaming
//! the response over SSE.

mod api;
mod client;
mod config;

pub use api::ClaudeStreamDecoder;
pub use client::ClaudeClient;
pub use config::{AuthMethod, ClaudeConfig};
