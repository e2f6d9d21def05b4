//! Error types for the `petwise-rag` crate.

use petwise_core::PetwiseError;
use thiserror::Error;

/// Errors that can occur while filtering, retrieving, or ranking products.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The product catalog could not be loaded.
    #[error("Catalog error: {0}")]
    CatalogError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the retrieval pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Too many searches are already waiting for a slot.
    #[error("Search queue is full ({waiting} waiting)")]
    Busy {
        /// Number of searches waiting when the call was rejected.
        waiting: usize,
    },
}

impl From<RagError> for PetwiseError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Busy { .. } => PetwiseError::Busy(err.to_string()),
            RagError::ConfigError(message) => PetwiseError::Config(message),
            other => PetwiseError::Retrieval(other.to_string()),
        }
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_maps_to_core_busy() {
        let err: PetwiseError = RagError::Busy { waiting: 64 }.into();
        assert!(err.is_busy());

        let err: PetwiseError =
            RagError::VectorStoreError { backend: "InMemory".into(), message: "down".into() }
                .into();
        assert!(matches!(err, PetwiseError::Retrieval(m) if m.contains("InMemory")));
    }
}
