//! AWS event stream framing (`application/vnd.amazon.eventstream`).
//!
//! Bedrock's `ConverseStream` answers with a sequence of binary messages:
//!
//! ```text
//! total length (u32) | headers length (u32) | prelude CRC (u32)
//! headers | payload | message CRC (u32)
//! ```
//!
//! Integers are big-endian. The prelude CRC covers the two lengths, the
//! message CRC covers everything before it. As with SSE, the decoder is
//! separate from the transport so it can be tested on plain bytes.

use std::collections::HashMap;

use futures_util::{Stream, StreamExt};

use crate::error::GatewayError;
use crate::gateway::from_reqwest;

const PRELUDE_LEN: usize = 12;
const CRC_LEN: usize = 4;
const MIN_MESSAGE_LEN: usize = PRELUDE_LEN + CRC_LEN;
const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// Header value type tag for UTF-8 strings.
const HEADER_STRING: u8 = 7;

/// One decoded message. Only string headers are kept; those are the only
/// kind the service sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStreamMessage {
    pub headers: HashMap<String, String>,
    pub payload: Vec<u8>,
}

impl EventStreamMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// `event`, `exception` or `error`.
    pub fn message_type(&self) -> Option<&str> {
        self.header(":message-type")
    }

    pub fn event_type(&self) -> Option<&str> {
        self.header(":event-type")
    }

    pub fn exception_type(&self) -> Option<&str> {
        self.header(":exception-type")
    }
}

/// Incremental decoder: feed it body chunks, pull complete messages.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buf: Vec<u8>,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes of an incomplete message are still buffered.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }

    /// The next complete message, or `None` until more bytes arrive.
    pub fn next_message(&mut self) -> Result<Option<EventStreamMessage>, GatewayError> {
        if self.buf.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let total_len = read_u32(&self.buf[0..4]) as usize;
        let headers_len = read_u32(&self.buf[4..8]) as usize;
        if crc32fast::hash(&self.buf[0..8]) != read_u32(&self.buf[8..12]) {
            return Err(protocol("prelude checksum mismatch"));
        }
        if !(MIN_MESSAGE_LEN..=MAX_MESSAGE_LEN).contains(&total_len)
            || headers_len > total_len - MIN_MESSAGE_LEN
        {
            return Err(protocol(&format!(
                "invalid lengths (total {total_len}, headers {headers_len})"
            )));
        }
        if self.buf.len() < total_len {
            return Ok(None);
        }

        let message: Vec<u8> = self.buf.drain(..total_len).collect();
        let crc_at = total_len - CRC_LEN;
        if crc32fast::hash(&message[..crc_at]) != read_u32(&message[crc_at..]) {
            return Err(protocol("message checksum mismatch"));
        }

        let payload_at = PRELUDE_LEN + headers_len;
        Ok(Some(EventStreamMessage {
            headers: parse_headers(&message[PRELUDE_LEN..payload_at])?,
            payload: message[payload_at..crc_at].to_vec(),
        }))
    }
}

/// Turn a streaming HTTP response body into event stream messages.
pub fn event_stream_messages(
    response: reqwest::Response,
) -> impl Stream<Item = Result<EventStreamMessage, GatewayError>> + Send {
    async_stream::try_stream! {
        let mut body = Box::pin(response.bytes_stream());
        let mut decoder = EventStreamDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| from_reqwest(&e))?;
            decoder.push(&chunk);
            while let Some(message) = decoder.next_message()? {
                yield message;
            }
        }

        if decoder.has_partial() {
            Err::<(), _>(GatewayError::Network("event stream ended inside a message".into()))?;
        }
    }
}

fn protocol(detail: &str) -> GatewayError {
    GatewayError::Protocol(format!("event stream: {detail}"))
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn take<'a>(bytes: &mut &'a [u8], n: usize) -> Result<&'a [u8], GatewayError> {
    if bytes.len() < n {
        return Err(protocol("truncated header"));
    }
    let (head, tail) = bytes.split_at(n);
    *bytes = tail;
    Ok(head)
}

fn parse_headers(mut bytes: &[u8]) -> Result<HashMap<String, String>, GatewayError> {
    let mut headers = HashMap::new();
    while !bytes.is_empty() {
        let name_len = usize::from(take(&mut bytes, 1)?[0]);
        let name = std::str::from_utf8(take(&mut bytes, name_len)?)
            .map_err(|_| protocol("header name is not UTF-8"))?
            .to_string();
        let kind = take(&mut bytes, 1)?[0];
        let value_len = match kind {
            // bool true, bool false
            0 | 1 => 0,
            2 => 1,
            3 => 2,
            4 => 4,
            // i64, timestamp
            5 | 8 => 8,
            9 => 16,
            // byte array, string
            6 | 7 => {
                let len = take(&mut bytes, 2)?;
                usize::from(u16::from_be_bytes([len[0], len[1]]))
            }
            other => return Err(protocol(&format!("unknown header type {other}"))),
        };
        let value = take(&mut bytes, value_len)?;
        if kind == HEADER_STRING {
            let value = std::str::from_utf8(value)
                .map_err(|_| protocol("header value is not UTF-8"))?;
            headers.insert(name, value.to_string());
        }
    }
    Ok(headers)
}

/// Encode a message with string headers. Test support for decoders built
/// on top of this module.
#[cfg(test)]
pub(crate) fn encode_message(headers: &[(&str, &str)], payload: &[u8]) -> Vec<u8> {
    let mut header_bytes = Vec::new();
    for (name, value) in headers {
        header_bytes.push(name.len() as u8);
        header_bytes.extend_from_slice(name.as_bytes());
        header_bytes.push(HEADER_STRING);
        header_bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        header_bytes.extend_from_slice(value.as_bytes());
    }

    let total_len = PRELUDE_LEN + header_bytes.len() + payload.len() + CRC_LEN;
    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(&(total_len as u32).to_be_bytes());
    out.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&crc32fast::hash(&out).to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(payload);
    out.extend_from_slice(&crc32fast::hash(&out).to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str, payload: &str) -> Vec<u8> {
        encode_message(
            &[
                (":event-type", event_type),
                (":content-type", "application/json"),
                (":message-type", "event"),
            ],
            payload.as_bytes(),
        )
    }

    #[test]
    fn decodes_known_frame() {
        // An empty message with no headers, checked against a reference CRC.
        let bytes = encode_message(&[], b"");
        assert_eq!(
            bytes,
            [0, 0, 0, 0x10, 0, 0, 0, 0, 0x05, 0xc2, 0x48, 0xeb, 0x7d, 0x98, 0xc8, 0xff]
        );
        let mut decoder = EventStreamDecoder::new();
        decoder.push(&bytes);
        let message = decoder.next_message().unwrap().unwrap();
        assert!(message.headers.is_empty());
        assert!(message.payload.is_empty());
        assert!(!decoder.has_partial());
    }

    #[test]
    fn decodes_messages_split_across_chunks() {
        let mut bytes = event("contentBlockDelta", r#"{"delta":{"text":"Hi"}}"#);
        bytes.extend(event("messageStop", r#"{"stopReason":"end_turn"}"#));

        let mut decoder = EventStreamDecoder::new();
        let mut messages = Vec::new();
        for chunk in bytes.chunks(7) {
            decoder.push(chunk);
            while let Some(message) = decoder.next_message().unwrap() {
                messages.push(message);
            }
        }

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].event_type(), Some("contentBlockDelta"));
        assert_eq!(messages[0].message_type(), Some("event"));
        assert_eq!(messages[0].payload, br#"{"delta":{"text":"Hi"}}"#);
        assert_eq!(messages[1].event_type(), Some("messageStop"));
        assert!(!decoder.has_partial());
    }

    #[test]
    fn partial_message_waits_for_more_bytes() {
        let bytes = event("messageStart", r#"{"role":"assistant"}"#);
        let mut decoder = EventStreamDecoder::new();
        decoder.push(&bytes[..bytes.len() - 1]);
        assert_eq!(decoder.next_message().unwrap(), None);
        assert!(decoder.has_partial());
        decoder.push(&bytes[bytes.len() - 1..]);
        assert!(decoder.next_message().unwrap().is_some());
    }

    #[test]
    fn corrupted_frames_are_protocol_errors() {
        let mut bytes = event("messageStop", "{}");
        let last = bytes.len() - 5;
        bytes[last] ^= 0xff;
        let mut decoder = EventStreamDecoder::new();
        decoder.push(&bytes);
        assert!(matches!(decoder.next_message(), Err(GatewayError::Protocol(_))));

        let mut bytes = event("messageStop", "{}");
        bytes[3] ^= 0x01;
        let mut decoder = EventStreamDecoder::new();
        decoder.push(&bytes);
        let err = decoder.next_message().unwrap_err();
        assert!(err.to_string().contains("prelude checksum"));
    }

    #[test]
    fn skips_non_string_headers() {
        let mut headers = Vec::new();
        // ":flag" bool true, then "n" i32, then a string.
        headers.extend_from_slice(&[5, b':', b'f', b'l', b'a', b'g', 0]);
        headers.extend_from_slice(&[1, b'n', 4, 0, 0, 0, 42]);
        headers.extend_from_slice(&[2, b'k', b'v', 7, 0, 1, b'x']);
        let parsed = parse_headers(&headers).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["kv"], "x");

        assert!(parse_headers(&[3, b'a', b'b']).is_err());
        assert!(parse_headers(&[1, b'a', 42]).is_err());
    }
}
