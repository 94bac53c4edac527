//! # bertrag-core
//!
//! A grounded, citation-bearing document summarization engine. Deterministic
//! retrieval is strictly separated from generative synthesis: a generative
//! model composes prose only over evidence a reproducible pipeline has
//! already selected. It never judges importance and never introduces facts.
//!
//! ## Pipeline
//!
//! ```text
//! markdown -> segments (+embeddings, +salience) -> (optional persist)
//!          -> retrieved subset -> synthesis prompt -> generated text
//!          -> sanitized summary with trace
//! ```
//!
//! - [`parser`] splits markdown into ordered [`segment::Segment`]s with
//!   section ancestry.
//! - [`extraction`] scores every segment's salience and batches it through
//!   an [`embeddings::Embedder`], producing a [`segment::ExtractionResult`].
//! - [`bm25`] and [`retrieval`] fuse dense similarity, BM25, and salience via
//!   Reciprocal Rank Fusion (or a legacy weighted sum) into a document-ordered
//!   retrieved set.
//! - [`store`] persists segments and cached summaries, keyed by content hash
//!   and synthesis fingerprint, with an in-memory and a `rusqlite` + `usearch`
//!   HNSW-backed implementation behind the same [`store::VectorStore`] trait.
//! - [`synthesis`] builds a content-type-aware prompt, calls an external
//!   [`synthesis::Generator`], cleans boilerplate preambles, optionally runs
//!   a fact-sanity pass, and assembles the final [`synthesis::DocumentSummary`].
//! - [`orchestrator::Orchestrator`] ties the above together: cache-key
//!   derivation, the three-phase pipeline, and graceful degradation when an
//!   embedder, generator, or store is unavailable.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bertrag_core::{Orchestrator, OrchestratorConfig, SummaryTemplate};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> bertrag_core::Result<()> {
//! let orchestrator = Orchestrator::new(None, None, None, OrchestratorConfig::default());
//! let summary = orchestrator
//!     .summarize(
//!         "# Report\n\nWidgets shipped ahead of schedule this quarter.\n",
//!         "report.md",
//!         None,
//!         &SummaryTemplate::default_preset(),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! println!("{}", summary.executive_summary);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `embeddings` (default): local embedding generation via `fastembed`.
//! - `vector-search` (default): HNSW vector search via `usearch`.
//! - `bundled-sqlite` (default): the disk-backed [`store::sqlite::SqliteStore`].
//!
//! Out of scope for this crate (see `spec.md` / `SPEC_FULL.md`): document
//! conversion from binary formats, the CLI/TUI front-end, telemetry wiring,
//! the legacy MapReduce summarizer, collection-anthology mode, and concrete
//! vendor HTTP clients for the [`embeddings::Embedder`] / [`synthesis::Generator`]
//! contracts.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod bm25;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extraction;
pub mod hash;
pub mod orchestrator;
pub mod parser;
pub mod retrieval;
pub mod segment;
pub mod store;
pub mod synthesis;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use bm25::Bm25Index;
pub use config::{BertRagConfig, OrchestratorConfig, VectorStoreBackend};
pub use error::{OrchestratorError, Result};
pub use extraction::{ExtractionConfig, ExtractionError, SegmentExtractor};
pub use orchestrator::{IngestDocument, Orchestrator};
pub use retrieval::{RetrievalConfig, Retrieved, Retriever};
pub use segment::{ContentType, ExtractionResult, Segment, SegmentType};
pub use store::{CachedSummary, SearchHit, StoreError, StoreStats, VectorStore};
pub use store::memory::MemoryStore;
#[cfg(all(feature = "bundled-sqlite", feature = "vector-search"))]
pub use store::sqlite::SqliteStore;
pub use synthesis::{
    DocumentSummary, Entities, Generator, GeneratorError, OutputStyle, StaticGenerator,
    SummaryTemplate, SynthesisError, Synthesizer, TopicSummary, Trace,
};

pub use embeddings::{cosine_similarity, Embedder, EmbeddingError, NullEmbedder};
#[cfg(feature = "embeddings")]
#[cfg_attr(docsrs, doc(cfg(feature = "embeddings")))]
pub use embeddings::local::LocalFastembedEmbedder;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pipeline version folded into the orchestrator's pre-retrieval cache key.
pub const PIPELINE_VERSION: &str = orchestrator::PIPELINE_VERSION;

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        ContentType, DocumentSummary, ExtractionConfig, ExtractionResult, IngestDocument,
        MemoryStore, Orchestrator, OrchestratorConfig, OrchestratorError, RetrievalConfig,
        Retriever, Segment, SegmentExtractor, SegmentType, StaticGenerator, SummaryTemplate,
        VectorStore,
    };

    #[cfg(feature = "embeddings")]
    pub use crate::{Embedder, NullEmbedder};

    #[cfg(all(feature = "bundled-sqlite", feature = "vector-search"))]
    pub use crate::SqliteStore;
}
