//! Bedrock client configuration.

use std::fmt;

use strands_common::StrandsError;

pub(crate) const BEDROCK_TOKEN_ENV: &str = "AWS_BEARER_TOKEN_BEDROCK";

#[derive(Clone)]
pub struct BedrockConfig {
    pub api_key: String,
    pub region: String,
    pub model_id: String,
    /// Overrides `https://bedrock-runtime.{region}.amazonaws.com`.
    pub endpoint: Option<String>,
}

impl fmt::Debug for BedrockConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BedrockConfig")
            .field("api_key", &"[REDACTED]")
            .field("region", &self.region)
            .field("model_id", &self.model_id)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl BedrockConfig {
    pub fn new(
        api_key: impl Into<String>,
        region: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            region: region.into(),
            model_id: model_id.into(),
            endpoint: None,
        }
    }

    /// Read the API key from `AWS_BEARER_TOKEN_BEDROCK`.
    pub fn from_env(
        region: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Result<Self, StrandsError> {
        let key = std::env::var(BEDROCK_TOKEN_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                StrandsError::Credentials(format!(
                    "Bedrock API key not configured. Set {BEDROCK_TOKEN_ENV}."
                ))
            })?;
        Ok(Self::new(key, region, model_id))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Full `ConverseStream` URL for the configured model.
    pub fn converse_stream_url(&self) -> String {
        let base = match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        };
        format!(
            "{base}/model/{}/converse-stream",
            urlencoding::encode(&self.model_id)
        )
    }
}
