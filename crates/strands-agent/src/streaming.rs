//! Server-Sent Events (SSE) parsing.
//!
//! The Anthropic Messages API streams its response as SSE. The line
//! parser is separate from the transport so it can be tested on plain
//! strings.

use futures_util::{Stream, StreamExt};
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::error::GatewayError;

/// A single SSE event parsed from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The event type (e.g., "message_start", "content_block_delta").
    pub event: Option<String>,
    /// The event data (JSON string).
    pub data: String,
}

/// Incremental line-based SSE parser.
#[derive(Debug, Default)]
pub struct SseParser {
    event: Option<String>,
    data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator). Returns an event when the
    /// line completes one.
    pub fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(value);
            }
            // id:, retry:
            _ => {}
        }
        None
    }

    /// Flush whatever is buffered at end of stream.
    pub fn finish(mut self) -> Option<SseEvent> {
        self.take()
    }

    fn take(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data),
        })
    }
}

/// Turn a streaming HTTP response body into a stream of SSE events.
pub fn sse_events(
    response: reqwest::Response,
) -> impl Stream<Item = Result<SseEvent, GatewayError>> + Send {
    async_stream::try_stream! {
        let byte_stream = response
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other));
        let reader = tokio::io::BufReader::new(StreamReader::new(byte_stream));
        let mut lines = reader.lines();
        let mut parser = SseParser::new();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?
        {
            if let Some(event) = parser.push_line(&line) {
                yield event;
            }
        }

        if let Some(event) = parser.finish() {
            yield event;
        }
    }
}
