//! Retrieval-and-answer core of the Intelligent Docs assistant.
//!
//! Equipment manuals, maintenance guides and safety procedures are chunked,
//! embedded and stored in a [`VectorIndex`]. Questions are answered from the
//! best-matching chunks with explicit `Source:` citations, or with a
//! fallback message when evidence is missing, weak, or the question touches a
//! safety-critical topic.
//!
//! This crate provides:
//! - [`TokenChunker`]: sentence-aware, token-bounded chunking with overlap
//! - [`EmbeddingProvider`]: the embedding seam, plus [`HashingEmbeddingProvider`]
//! - [`VectorIndex`]: inner-product search over immutable index generations
//! - [`Retriever`]: dense + keyword retrieval with reciprocal-rank fusion
//! - [`AnswerComposer`]: confidence-gated answers with enforced citations
//! - [`RagPipeline`]: ingestion and [`answer_query`](RagPipeline::answer_query)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use idocs_rag::{Document, HashingEmbeddingProvider, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .build()?;
//!
//! let text = "Normal operating temperature is 900 degrees Celsius.";
//! pipeline.ingest(&Document::new("ops", "Operations Manual", text)).await?;
//! let answer = pipeline.answer_query("What is the normal operating temperature?").await;
//! println!("{}", answer.text);
//! ```

pub mod chunking;
pub mod composer;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod hashing;
pub mod index;
pub mod keyword;
pub mod pipeline;
pub mod reranker;
pub mod retriever;
mod text;

pub use chunking::{Chunker, TokenChunker, chunk_document, reassemble};
pub use composer::AnswerComposer;
pub use config::{DEFAULT_SAFETY_TERMS, RagConfig, RagConfigBuilder};
pub use document::{
    Answer, AnswerOutcome, Chunk, Citation, Document, IndexEntry, RetrievalResult,
};
pub use embedding::{EmbeddingProvider, dot, normalize};
pub use error::{RagError, Result};
pub use fusion::{RankedList, reciprocal_rank_fusion};
pub use hashing::HashingEmbeddingProvider;
pub use index::{IndexGeneration, VectorIndex};
pub use keyword::{KeywordScorer, TermOverlapScorer};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use reranker::{NoOpReranker, Reranker};
pub use retriever::Retriever;
