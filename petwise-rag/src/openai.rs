//! Query embeddings from the OpenAI `/embeddings` endpoint.
//!
//! Only the query side lives here; the index is built offline with the same
//! model. Batches larger than the endpoint accepts are split into several
//! requests and the vectors are returned in input order.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "OpenAI";
const API_BASE: &str = "https://api.openai.com/v1";
const MODEL: &str = "text-embedding-3-small";
const MODEL_DIMENSIONS: usize = 1536;
/// Inputs per request accepted by the endpoint.
const MAX_INPUTS: usize = 2048;

fn embedding_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.to_string(), message: message.into() }
}

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct Response {
    data: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// An [`EmbeddingProvider`] for OpenAI and OpenAI-compatible gateways.
///
/// ```rust,ignore
/// let provider = OpenAIEmbeddingProvider::new(api_key)?
///     .with_base_url("http://localhost:8080/v1")
///     .with_timeout(Duration::from_secs(20))?;
/// let vector = provider.embed("grain-free puppy food").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    dimensions: usize,
    /// Sent as `dimensions` when the index uses shortened vectors.
    shortened: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(embedding_error("API key must not be empty"));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            endpoint: format!("{API_BASE}/embeddings"),
            model: MODEL.to_string(),
            dimensions: MODEL_DIMENSIONS,
            shortened: None,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.endpoint = format!("{}/embeddings", base_url.into().trim_end_matches('/'));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| embedding_error(format!("failed to build HTTP client: {e}")))?;
        Ok(self)
    }

    /// Request vectors shortened to `dims` components.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.shortened = Some(dims);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, input: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = Request { model: &self.model, input, dimensions: self.shortened };
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "embedding request failed");
                embedding_error(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            error!(provider = PROVIDER, %status, "embedding API error");
            return Err(embedding_error(format!("API returned {status}: {detail}")));
        }

        let mut parsed: Response = response
            .json()
            .await
            .map_err(|e| embedding_error(format!("unreadable response: {e}")))?;
        if parsed.data.len() != input.len() {
            return Err(embedding_error(format!(
                "expected {} embeddings, got {}",
                input.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text])
            .await?
            .pop()
            .ok_or_else(|| embedding_error("API returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_INPUTS) {
            debug!(provider = PROVIDER, model = %self.model, inputs = chunk.len(), "embedding batch");
            out.extend(self.request(chunk).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_is_rejected() {
        assert!(OpenAIEmbeddingProvider::new(" ").is_err());
    }

    #[test]
    fn gateway_url_and_shortened_vectors() {
        let provider = OpenAIEmbeddingProvider::new("sk-test")
            .unwrap()
            .with_base_url("http://localhost:9000/v1/")
            .with_dimensions(256);
        assert_eq!(provider.endpoint(), "http://localhost:9000/v1/embeddings");
        assert_eq!(provider.dimensions(), 256);
    }

    #[test]
    fn request_omits_dimensions_unless_shortened() {
        let body = serde_json::to_value(Request { model: MODEL, input: &["a"], dimensions: None }).unwrap();
        assert!(body.get("dimensions").is_none());
        assert_eq!(body["input"][0], "a");
    }
}
