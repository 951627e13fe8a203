//! Claude API client configuration.

use std::fmt;

use strands_common::StrandsError;

pub(crate) const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// How the client authenticates with the Claude API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Anthropic API key (`x-api-key` header).
    ApiKey,
    /// OAuth Bearer token (`Authorization: Bearer`).
    OAuth,
}

#[derive(Clone)]
pub struct ClaudeConfig {
    pub token: String,
    pub auth_method: AuthMethod,
    pub model: String,
    pub api_url: String,
}

impl fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("auth_method", &self.auth_method)
            .field("token", &"[REDACTED]")
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl ClaudeConfig {
    pub fn new(token: impl Into<String>, auth_method: AuthMethod) -> Self {
        Self {
            token: token.into(),
            auth_method,
            model: "claude-sonnet-4-5-20250929".to_string(),
            api_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Resolve credentials from the environment.
    ///
    /// Resolution order:
    /// 1. `ANTHROPIC_API_KEY` (API key auth)
    /// 2. `CLAUDE_CODE_OAUTH_TOKEN` (OAuth auth)
    pub fn from_env() -> Result<Self, StrandsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StrandsError> {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = present("ANTHROPIC_API_KEY") {
            return Ok(Self::new(key, AuthMethod::ApiKey));
        }
        if let Some(token) = present("CLAUDE_CODE_OAUTH_TOKEN") {
            return Ok(Self::new(token, AuthMethod::OAuth));
        }

        Err(StrandsError::Credentials(
            "Claude API not configured. Set ANTHROPIC_API_KEY or CLAUDE_CODE_OAUTH_TOKEN.".into(),
        ))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}
