//! Data types for documents, chunks, index entries, retrieval results and answers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A source document supplied by an extraction step (PDF, markdown, plain text).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// Human-readable title, used in citations.
    pub title: String,
    /// The extracted plain text of the document.
    pub raw_text: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document with no metadata and no source URI.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            raw_text: raw_text.into(),
            metadata: HashMap::new(),
            source_uri: None,
        }
    }
}

/// A contiguous, token-bounded slice of a [`Document`].
///
/// `text` is `raw_text[start_offset..end_offset]`. The first chunk of a
/// document starts at offset 0 and the last one ends at the end of the text,
/// so whitespace between tokens is never lost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, `{document_id}_{sequence_index}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Position of this chunk within its document.
    pub sequence_index: usize,
    /// The text content of the chunk.
    pub text: String,
    /// Number of whitespace-delimited tokens in `text`.
    pub token_count: usize,
    /// Byte offset of `text` within the document.
    pub start_offset: usize,
    /// Byte offset one past the end of `text` within the document.
    pub end_offset: usize,
}

/// The unit stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The [`Chunk`] this entry was built from.
    pub chunk_id: String,
    /// L2-normalized embedding of the chunk text.
    pub vector: Vec<f32>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The chunk text.
    pub text: String,
    /// Title of the parent document.
    pub title: String,
}

/// A retrieved chunk, produced per query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    /// The retrieved chunk.
    pub chunk_id: String,
    /// Cosine similarity between the query and the chunk (higher is more relevant).
    pub score: f32,
    /// Rank-fusion credit that determined this result's position.
    pub fused_score: f32,
    /// The chunk text.
    pub text: String,
    /// Title of the parent document.
    pub title: String,
    /// The ID of the parent document.
    pub document_id: String,
}

/// A reference to a document used to build an [`Answer`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Citation {
    /// Document title.
    pub title: String,
    /// Document identifier.
    pub document_id: String,
}

/// Which branch of the answer state machine produced an [`Answer`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Retrieval found nothing.
    NoEvidence,
    /// The best match scored below the confidence threshold.
    LowConfidence,
    /// The answer is composed from cited chunks.
    Confident,
    /// The query touched a safety-critical topic.
    Escalated,
    /// The query exceeded its time budget.
    TimedOut,
    /// The embedding provider kept failing.
    Unavailable,
}

/// The externally visible result of a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// Answer text shown to the user.
    pub text: String,
    /// Documents the answer draws on, in order of first use.
    pub citations: Vec<Citation>,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// `true` for every outcome except [`AnswerOutcome::Confident`].
    pub is_fallback: bool,
    /// The state that produced this answer.
    pub outcome: AnswerOutcome,
}
