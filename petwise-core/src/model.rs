//! The text-generation provider seam.
//!
//! An [`Llm`] supports two call shapes: a non-streaming call that returns either
//! a plain message or one or more function calls, and a streaming call that
//! yields [`StreamEvent`]s. Providers map their wire formats onto these types;
//! callers never see provider-specific JSON.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tool::ToolDeclaration;
use crate::types::Content;

/// Per-call generation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Ask the provider to return a single JSON object.
    pub json_object: bool,
}

/// A request to an [`Llm`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Model id. Empty means "the provider's configured default".
    pub model: String,
    pub contents: Vec<Content>,
    pub tools: Vec<ToolDeclaration>,
    pub config: GenerateConfig,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, contents: Vec<Content>) -> Self {
        Self { model: model.into(), contents, ..Default::default() }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.config.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn with_json_object(mut self) -> Self {
        self.config.json_object = true;
        self
    }
}

/// A structured function call emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub id: String,
    pub call_id: String,
    pub name: String,
    /// Raw argument JSON exactly as the model produced it.
    pub arguments_json: String,
}

/// One entry of a non-streaming response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message { text: String },
    FunctionCall(FunctionCall),
}

/// The result of a non-streaming [`Llm::generate`] call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub output: Vec<OutputItem>,
}

impl LlmResponse {
    /// A response consisting of a single plain message.
    pub fn message(text: impl Into<String>) -> Self {
        Self { output: vec![OutputItem::Message { text: text.into() }] }
    }

    pub fn with_function_call(
        mut self,
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments_json: impl Into<String>,
    ) -> Self {
        let call_id = call_id.into();
        self.output.push(OutputItem::FunctionCall(FunctionCall {
            id: format!("fc_{call_id}"),
            call_id,
            name: name.into(),
            arguments_json: arguments_json.into(),
        }));
        self
    }

    /// Concatenated text of all message items, or `None` if there are none.
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Message { text } => Some(text.as_str()),
                OutputItem::FunctionCall(_) => None,
            })
            .collect();
        if texts.is_empty() { None } else { Some(texts.join("")) }
    }

    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.output
            .iter()
            .filter_map(|item| match item {
                OutputItem::FunctionCall(call) => Some(call),
                OutputItem::Message { .. } => None,
            })
            .collect()
    }
}

/// An event produced by a streaming [`Llm::generate_stream`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// `output_text.delta`
    OutputTextDelta { delta: String },
    Completed,
    Error { message: String },
}

/// A stream of events from one streaming call, delivered in arrival order.
pub type LlmEventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// A text-generation service with function calling and token streaming.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Provider/model label used in logs.
    fn name(&self) -> &str;

    /// Non-streaming call: returns messages and/or function calls.
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Streaming call: returns an event stream once the provider accepted the request.
    async fn generate_stream(&self, request: LlmRequest) -> Result<LlmEventStream>;
}
