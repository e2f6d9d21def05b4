//! Role-tagged conversation content.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";
pub const ROLE_TOOL: &str = "tool";

/// A single message in a conversation sent to an [`Llm`](crate::Llm).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    /// `system`, `user`, `assistant` or `tool`.
    pub role: String,
    pub parts: Vec<Part>,
}

/// One piece of a [`Content`] message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },
    /// An image given either as an `https://` URL or a `data:` URL.
    Image {
        url: String,
    },
    /// A tool invocation emitted by the model during routing.
    FunctionCall {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        call_id: String,
        name: String,
        args: Value,
    },
    /// The output returned to the model for an earlier [`Part::FunctionCall`].
    FunctionResponse {
        call_id: String,
        name: String,
        output: String,
    },
}

impl Content {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into(), parts: Vec::new() }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(crate::ROLE_SYSTEM).with_text(text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(crate::ROLE_USER).with_text(text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(crate::ROLE_ASSISTANT).with_text(text)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::Text { text: text.into() });
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.parts.push(Part::Image { url: url.into() });
        self
    }

    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
