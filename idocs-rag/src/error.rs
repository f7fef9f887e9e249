//! Error types for the `idocs-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering queries.
#[derive(Debug, Error)]
pub enum RagError {
    /// Chunking or pipeline parameters are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A search was issued against an index that holds no entries.
    #[error("Vector index is empty; ingest documents before querying")]
    EmptyIndex,

    /// The embedding provider failed to produce a vector.
    #[error("Embedding failure ({provider}): {message}")]
    EmbeddingFailure {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding + search span exceeded the query budget.
    #[error("Query exceeded its time budget of {budget_ms} ms")]
    Timeout {
        /// The budget that was exceeded, in milliseconds.
        budget_ms: u64,
    },

    /// A vector's length does not match the index dimensionality.
    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality fixed by the index.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },

    /// An error occurred during result reranking.
    #[error("Reranker error ({reranker}): {message}")]
    RerankerError {
        /// The reranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
