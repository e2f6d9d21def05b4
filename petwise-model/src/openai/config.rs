//! Configuration for the OpenAI client.

use std::time::Duration;

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for [`OpenAIClient`](super::OpenAIClient).
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    /// Default model used when a request leaves `model` empty.
    pub model: String,
    pub base_url: String,
    pub organization_id: Option<String>,
    /// Whole-request timeout, including the time to drain a stream.
    pub timeout: Duration,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_API_BASE.to_string(),
            organization_id: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Settings for an OpenAI-compatible gateway.
    pub fn compatible(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::new(api_key, model).with_base_url(base_url)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatible_trims_trailing_slash() {
        let config = OpenAIConfig::compatible("key", "http://localhost:8080/v1/", "local");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
