//! Retry policy and provider error classification.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::GatewayError;

/// Bounded exponential backoff plus an overall request deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Deadline covering every attempt and backoff sleep of one `send`.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1 for the first retry):
    /// `base * 2^(retry - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(30);
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.max_delay)
    }
}

fn context_length_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)context.?length|context.?window|too many tokens|prompt is too long|input is too long")
            .expect("context length regex must compile")
    })
}

fn transient_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|throttl|too many requests|overloaded|service.?unavailable|upstream.?connect|connection.?refused")
            .expect("transient error regex must compile")
    })
}

/// Map a non-success HTTP status and its body to a gateway error.
pub fn classify_http_error(status: u16, body: &str) -> GatewayError {
    let detail = summarize(status, body);
    match status {
        401 | 403 => GatewayError::Unauthorized(detail),
        429 => GatewayError::RateLimited(detail),
        408 => GatewayError::Network(detail),
        500..=599 => GatewayError::ServiceUnavailable(detail),
        _ if context_length_regex().is_match(body) => GatewayError::ContextLengthExceeded(detail),
        _ if transient_regex().is_match(body) => GatewayError::RateLimited(detail),
        _ => GatewayError::BadRequest(detail),
    }
}

/// Map an error reported inside an otherwise successful response (an SSE
/// `error` event or an exception payload) by its type name and message.
pub fn classify_stream_error(kind: &str, message: &str) -> GatewayError {
    let detail = format!("{kind}: {message}");
    let kind_lower = kind.to_ascii_lowercase();
    if kind_lower.contains("overloaded")
        || kind_lower.contains("unavailable")
        || kind_lower.contains("internalserver")
        || kind_lower == "api_error"
    {
        GatewayError::ServiceUnavailable(detail)
    } else if kind_lower.contains("rate_limit") || kind_lower.contains("throttl") {
        GatewayError::RateLimited(detail)
    } else if kind_lower.contains("auth") || kind_lower.contains("permission") || kind_lower.contains("accessdenied") {
        GatewayError::Unauthorized(detail)
    } else if context_length_regex().is_match(message) {
        GatewayError::ContextLengthExceeded(detail)
    } else if transient_regex().is_match(message) {
        GatewayError::RateLimited(detail)
    } else {
        GatewayError::Protocol(detail)
    }
}

/// Map a transport-level reqwest failure.
pub fn from_reqwest(err: &reqwest::Error) -> GatewayError {
    if let Some(status) = err.status() {
        return classify_http_error(status.as_u16(), &err.to_string());
    }
    if err.is_decode() {
        return GatewayError::Protocol(err.to_string());
    }
    if err.is_builder() {
        return GatewayError::BadRequest(err.to_string());
    }
    // Connect, timeout, body and redirect failures can all clear up on retry.
    GatewayError::Network(err.to_string())
}

fn summarize(status: u16, body: &str) -> String {
    let body: String = body.chars().take(200).collect();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {body}")
    }
}
