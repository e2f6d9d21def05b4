//! Error types shared across the Petwise crates.

use std::time::Duration;

use thiserror::Error;

/// Errors that can cross a crate boundary.
#[derive(Debug, Error)]
pub enum PetwiseError {
    /// The LLM provider failed or returned something unusable.
    #[error("Model error: {0}")]
    Model(String),

    /// The LLM provider rejected the call because of rate limits or quota.
    #[error("Rate limited by {provider}: {message}")]
    RateLimited {
        /// The provider that rejected the call.
        provider: String,
        /// Provider supplied detail.
        message: String,
    },

    /// The model asked for a tool that is not registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool arguments were missing or of the wrong type.
    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments {
        /// The tool whose arguments failed validation.
        tool: String,
        /// A description of the failure.
        message: String,
    },

    /// A tool handler failed while executing.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Product or article retrieval failed.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Too many searches are queued.
    #[error("Service busy: {0}")]
    Busy(String),

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The deadline that was exceeded.
        after: Duration,
    },

    /// The user/pet/interaction store failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PetwiseError {
    /// Whether the failure is a provider rate limit or quota rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether the failure came from search backpressure.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

/// A convenience result type for Petwise operations.
pub type Result<T> = std::result::Result<T, PetwiseError>;
