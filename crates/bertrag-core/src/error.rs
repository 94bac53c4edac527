//! Crate-wide error taxonomy
//!
//! Each module (parser, extraction, embeddings, store, synthesis) owns a
//! narrow `thiserror` enum for its own failure modes. `OrchestratorError` is
//! the union type returned from the top-level pipeline; module errors
//! convert into it via `#[from]`.

use thiserror::Error;

/// Top-level error returned by [`crate::orchestrator::Orchestrator`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed or empty markdown input.
    #[error("input error: {0}")]
    Input(String),

    /// The embedder is unavailable. Recoverable: retrieval degrades to
    /// salience-only.
    #[error("embedder unavailable: {0}")]
    EmbedderUnavailable(String),

    /// The generator is unavailable. Recoverable: synthesis falls back to
    /// an extractive, citation-bearing bullet summary.
    #[error("generator unavailable: {0}")]
    GeneratorUnavailable(String),

    /// The configured store is unavailable or corrupt. Recoverable by
    /// falling back to an in-memory store for the current run.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store reported internal corruption distinct from unavailability.
    #[error("store corrupted: {0}")]
    StoreCorruption(String),

    /// An operation exceeded its configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The operation was cancelled; no partial state was persisted.
    #[error("operation cancelled")]
    Cancelled,

    /// An internal invariant was violated. Never recoverable, never
    /// swallowed.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// A parser-level failure that could not be skipped.
    #[error(transparent)]
    Parse(#[from] crate::parser::ParseError),

    /// An extraction-level failure (wraps a parser failure).
    #[error(transparent)]
    Extraction(#[from] crate::extraction::ExtractionError),

    /// A synthesis-level failure.
    #[error(transparent)]
    Synthesis(#[from] crate::synthesis::SynthesisError),
}

/// Crate-wide result alias for orchestrator-level operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
