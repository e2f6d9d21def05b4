//! # petwise-core
//!
//! Shared types and traits for the Petwise shopping assistant.
//!
//! ## Overview
//!
//! Every other crate in the workspace builds on the definitions here:
//!
//! - [`Content`] / [`Part`] - role-tagged conversation messages
//! - [`Llm`] - the text-generation provider seam (routing, composing, persona updates)
//! - [`ToolDeclaration`] - function schemas advertised to the model
//! - [`PetProfile`], [`UserContext`], [`InteractionEvent`] - records consumed from
//!   the user/pet/interaction store
//! - [`PetwiseError`] - the error type that crosses crate boundaries

pub mod domain;
pub mod error;
pub mod model;
pub mod tool;
pub mod types;

pub use domain::{ChatRole, ChatTurn, EventType, InteractionEvent, PetProfile, UserContext};
pub use error::{PetwiseError, Result};
pub use model::{
    FunctionCall, GenerateConfig, Llm, LlmEventStream, LlmRequest, LlmResponse, OutputItem,
    StreamEvent,
};
pub use tool::ToolDeclaration;
pub use types::{Content, Part, ROLE_ASSISTANT, ROLE_SYSTEM, ROLE_TOOL, ROLE_USER};
