//! OpenAI client implementation.

use async_stream::stream;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use petwise_core::{Llm, LlmEventStream, LlmRequest, LlmResponse, PetwiseError, Result, StreamEvent};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::config::OpenAIConfig;
use super::convert;

const PROVIDER: &str = "OpenAI";

/// OpenAI client for the Responses API and OpenAI-compatible gateways.
pub struct OpenAIClient {
    http: reqwest::Client,
    config: OpenAIConfig,
}

impl OpenAIClient {
    /// Create a new OpenAI client.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(PetwiseError::Config("OpenAI API key must not be empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PetwiseError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Create a client for an OpenAI-compatible API.
    pub fn compatible(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        Self::new(OpenAIConfig::compatible(api_key, base_url, model))
    }

    async fn post_responses(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/responses", self.config.base_url);
        let mut builder = self.http.post(url).bearer_auth(&self.config.api_key).json(body);
        if let Some(org) = &self.config.organization_id {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder.send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "request failed");
            PetwiseError::Model(format!("{PROVIDER} request failed: {e}"))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = convert::error_detail(&body);
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(provider = PROVIDER, %status, "rate limited");
            return Err(PetwiseError::RateLimited { provider: PROVIDER.into(), message: detail });
        }
        error!(provider = PROVIDER, %status, "API error");
        Err(PetwiseError::Model(format!("{PROVIDER} API returned {status}: {detail}")))
    }
}

#[async_trait]
impl Llm for OpenAIClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let body = convert::build_request_body(&request, &self.config.model, false);
        debug!(
            provider = PROVIDER,
            messages = request.contents.len(),
            tools = request.tools.len(),
            "generate"
        );

        let response = self.post_responses(&body).await?;
        let json: Value = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            PetwiseError::Model(format!("failed to parse {PROVIDER} response: {e}"))
        })?;
        convert::parse_response(&json)
    }

    async fn generate_stream(&self, request: LlmRequest) -> Result<LlmEventStream> {
        let body = convert::build_request_body(&request, &self.config.model, true);
        debug!(provider = PROVIDER, messages = request.contents.len(), "generate_stream");

        let response = self.post_responses(&body).await?;
        let mut events = response.bytes_stream().eventsource();

        let stream = stream! {
            let mut finished = false;
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        let Some(parsed) = convert::parse_stream_event(&event.data) else {
                            continue;
                        };
                        let terminal =
                            matches!(parsed, StreamEvent::Completed | StreamEvent::Error { .. });
                        yield parsed;
                        if terminal {
                            finished = true;
                            break;
                        }
                    }
                    Err(e) => {
                        error!(provider = PROVIDER, error = %e, "stream transport error");
                        yield StreamEvent::Error { message: format!("stream error: {e}") };
                        finished = true;
                        break;
                    }
                }
            }
            if !finished {
                warn!(provider = PROVIDER, "stream ended without a completion event");
                yield StreamEvent::Completed;
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        let result = OpenAIClient::new(OpenAIConfig::new("  ", "gpt-4.1-mini"));
        assert!(matches!(result, Err(PetwiseError::Config(_))));
    }

    #[test]
    fn name_reports_default_model() {
        let client = OpenAIClient::new(OpenAIConfig::new("sk-test", "gpt-4.1-mini")).unwrap();
        assert_eq!(client.name(), "gpt-4.1-mini");
    }
}
