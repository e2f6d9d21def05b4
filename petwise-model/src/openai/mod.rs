//! OpenAI Responses API provider.
//!
//! # Features
//!
//! - **Tool Calling**: function declarations in, `function_call` items out
//! - **Streaming**: `response.output_text.delta` events over SSE
//! - **JSON mode**: `text.format = json_object` for structured replies
//!
//! # Example
//!
//! ```rust,ignore
//! use petwise_model::openai::{OpenAIClient, OpenAIConfig};
//!
//! let client = OpenAIClient::new(
//!     OpenAIConfig::new("sk-...", "gpt-4.1-mini").with_timeout(Duration::from_secs(30)),
//! )?;
//! ```

mod client;
mod config;
mod convert;

pub use client::OpenAIClient;
pub use config::{OPENAI_API_BASE, OpenAIConfig};
