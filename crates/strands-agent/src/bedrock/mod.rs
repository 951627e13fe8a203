//! AWS Bedrock Runtime client.
//!
//! Implements [`ModelClient`](crate::ModelClient) over the Bedrock
//! `ConverseStream` API, authenticated with a Bedrock API key sent as a
//! bearer token (`AWS_BEARER_TOKEN_BEDROCK`). The response arrives as AWS
//! event stream messages and is decoded into model events as it streams.

mod api;
mod client;
mod config;

pub use api::ConverseStreamDecoder;
pub use client::BedrockClient;
pub use config::BedrockConfig;
