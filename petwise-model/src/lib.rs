//! # petwise-model
//!
//! LLM provider integrations for the Petwise assistant.
//!
//! ## Overview
//!
//! - [`OpenAIClient`] - the OpenAI Responses API (function calling, SSE token
//!   streaming, JSON-object mode) and OpenAI-compatible gateways
//! - [`MockLlm`] - a scripted [`Llm`](petwise_core::Llm) for tests and offline runs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use petwise_model::openai::{OpenAIClient, OpenAIConfig};
//!
//! let model = OpenAIClient::new(OpenAIConfig::new(
//!     std::env::var("OPENAI_API_KEY").unwrap(),
//!     "gpt-4.1-mini",
//! ))?;
//! ```

pub mod mock;
pub mod openai;

pub use mock::{MockLlm, MockStream};
pub use openai::{OpenAIClient, OpenAIConfig};
