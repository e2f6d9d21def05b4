//! # petwise-runner
//!
//! The chat turn and everything wrapped around it.
//!
//! ## Overview
//!
//! - [`TurnOrchestrator`] - route with tools, run them, compose a streamed answer
//! - [`capture`] - forwards reply chunks while pulling out `<button>` lines
//! - [`format_evidence`] - ranked products as compose-time instructions
//! - [`personalized_greeting`] - birthday, new-pet and pet-picker openings
//! - [`ProductQa`] - single-call product comparison and questions
//! - [`Assistant`] - all of the above behind one handle, built from [`AppConfig`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use petwise_runner::{AppConfig, Assistant, TurnRequest};
//!
//! let config = AppConfig::from_env()?;
//! let assistant = Assistant::from_config(&config, store)?;
//!
//! let mut turn = assistant.handle_turn(TurnRequest::new("u1", "puppy food, no chicken")).await;
//! while let Some(chunk) = turn.stream.next().await {
//!     print!("{chunk}");
//! }
//! let outcome = turn.finished.await?;
//! println!("buttons: {:?}", outcome.reply.buttons);
//! ```

pub mod assistant;
pub mod capture;
pub mod config;
pub mod evidence;
pub mod greeter;
pub mod orchestrator;
pub mod product_qa;
pub mod prompts;

pub use assistant::Assistant;
pub use capture::{CompletedReply, MAX_BUTTONS, ReplyStream, STREAM_APOLOGY, capture, capture_text, extract_buttons};
pub use config::{AppConfig, OrchestratorConfig, OrchestratorConfigBuilder};
pub use evidence::{EvidenceLimits, format_evidence};
pub use greeter::{Greeting, SOMEONE_ELSE, personalized_greeting};
pub use orchestrator::{TurnHandle, TurnOrchestrator, TurnOutcome, TurnRequest, TurnState};
pub use product_qa::{COMPETITOR_DOMAINS, HIGH_DEMAND_REPLY, ProductQa, scrub_competitors};
pub use prompts::{BUSY_REPLY, SENTINEL_REPLY};
