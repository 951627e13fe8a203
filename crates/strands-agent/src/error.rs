//! Error types for the agent core.

use std::time::Duration;

use strands_common::SessionId;

/// Failures reaching or talking to a model provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("model request timed out after {0:?}")]
    Timeout(Duration),
}

impl GatewayError {
    /// Whether a fresh attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimited(_)
                | GatewayError::ServiceUnavailable(_)
                | GatewayError::Network(_)
        )
    }
}

/// Failures registering, resolving, or invoking tools.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("duplicate tool: {0}")]
    DuplicateTool(String),

    #[error("invalid schema for {tool}: {reason}")]
    InvalidSchema { tool: String, reason: String },
}

/// Terminal failures of one agent loop run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoopError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("tool-call iteration limit exceeded after {rounds} rounds")]
    IterationLimitExceeded { rounds: u32 },
}

/// Failures loading a file to attach to a user turn.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported attachment type: {0}")]
    UnsupportedFormat(String),

    #[error("{path} is {size} bytes, over the {limit} byte limit")]
    TooLarge { path: String, size: u64, limit: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} is busy with another request")]
    SessionBusy(SessionId),

    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
}

impl From<RegistryError> for strands_common::StrandsError {
    fn from(err: RegistryError) -> Self {
        strands_common::StrandsError::Registry(err.to_string())
    }
}

impl From<GatewayError> for strands_common::StrandsError {
    fn from(err: GatewayError) -> Self {
        strands_common::StrandsError::Agent(err.to_string())
    }
}

impl From<AttachmentError> for strands_common::StrandsError {
    fn from(err: AttachmentError) -> Self {
        strands_common::StrandsError::Other(err.to_string())
    }
}

impl From<SessionError> for strands_common::StrandsError {
    fn from(err: SessionError) -> Self {
        strands_common::StrandsError::Agent(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(GatewayError::RateLimited("429".into()).is_transient());
        assert!(GatewayError::ServiceUnavailable("503".into()).is_transient());
        assert!(GatewayError::Network("reset".into()).is_transient());

        assert!(!GatewayError::Unauthorized("401".into()).is_transient());
        assert!(!GatewayError::BadRequest("400".into()).is_transient());
        assert!(!GatewayError::ContextLengthExceeded("too long".into()).is_transient());
        assert!(!GatewayError::Protocol("bad frame".into()).is_transient());
        assert!(!GatewayError::Timeout(Duration::from_secs(1)).is_transient());
    }

    #[test]
    fn loop_error_wraps_gateway() {
        let err: LoopError = GatewayError::Unauthorized("bad key".into()).into();
        assert_eq!(err.to_string(), "unauthorized: bad key");

        let err = LoopError::IterationLimitExceeded { rounds: 8 };
        assert_eq!(
            err.to_string(),
            "tool-call iteration limit exceeded after 8 rounds"
        );
    }

    #[test]
    fn registry_error_display() {
        let err = RegistryError::InvalidArguments {
            tool: "calculator".into(),
            reason: "missing required property `expression`".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid arguments for calculator: missing required property `expression`"
        );
    }

    #[test]
    fn attachment_error_display() {
        let err = AttachmentError::TooLarge {
            path: "scan.png".into(),
            size: 5_000_000,
            limit: 3_750_000,
        };
        assert_eq!(
            err.to_string(),
            "scan.png is 5000000 bytes, over the 3750000 byte limit"
        );
        let err: strands_common::StrandsError =
            AttachmentError::UnsupportedFormat("a.exe".into()).into();
        assert_eq!(err.to_string(), "unsupported attachment type: a.exe");
    }

    #[test]
    fn session_error_into_strands_error() {
        let err: strands_common::StrandsError =
            SessionError::SessionBusy(SessionId::from("s1")).into();
        assert_eq!(
            err.to_string(),
            "agent error: session s1 is busy with another request"
        );
    }
}
