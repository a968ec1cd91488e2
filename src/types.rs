//! Error taxonomy shared across the ingestion and generation pipelines.
//!
//! Variants map onto how callers are expected to react:
//!
//! * [`RagError::Config`] — fatal at startup; construction fails before any
//!   request is served.
//! * [`RagError::Embedding`], [`RagError::Completion`],
//!   [`RagError::VectorStore`] — transient external-call failures after retry
//!   exhaustion; request handlers degrade to a typed empty/fallback result.
//! * [`RagError::NotFound`] — a classified "does not exist" outcome, distinct
//!   from a failure.

use thiserror::Error;

/// Errors produced by the retrieval-augmented content pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid or missing configuration (credentials, dimensions). Fatal at
    /// startup; must prevent serving rather than fail per-request.
    #[error("configuration error: {0}")]
    Config(String),

    /// Embedding service call failed after retries.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// Chat-completion service call failed after retries.
    #[error("completion request failed: {0}")]
    Completion(String),

    /// Vector store upsert/query failed.
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// Keyed-store backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Semantic chunking failed for a page.
    #[error("chunking failed: {0}")]
    Chunking(String),

    /// Filesystem error while loading documents.
    #[error("io error: {0}")]
    Io(String),

    /// A keyed lookup missed: unknown quiz id, unknown evaluation id.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
}

impl RagError {
    /// Shorthand for a not-found outcome.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        RagError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns `true` when this error is a classified not-found outcome
    /// rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RagError::NotFound { .. })
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}
