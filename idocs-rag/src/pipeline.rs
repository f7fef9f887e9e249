//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates ingestion (chunk → embed → index) and
//! query answering (embed → retrieve → compose) by composing an
//! [`EmbeddingProvider`], a [`Chunker`], the [`VectorIndex`], a
//! [`Retriever`] and an [`AnswerComposer`].
//!
//! # Example
//!
//! ```rust,ignore
//! use idocs_rag::{Document, HashingEmbeddingProvider, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .build()?;
//!
//! pipeline.ingest(&document).await?;
//! let answer = pipeline.answer_query("What is the normal operating temperature?").await;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, TokenChunker};
use crate::composer::{self, AnswerComposer};
use crate::config::RagConfig;
use crate::document::{Answer, Chunk, Document, IndexEntry, RetrievalResult};
use crate::embedding::{EmbeddingProvider, normalize};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::keyword::{KeywordScorer, TermOverlapScorer};
use crate::reranker::Reranker;
use crate::retriever::Retriever;

/// The RAG pipeline orchestrator.
///
/// Owns the vector index and the set of ingested document IDs. Construct one
/// via [`RagPipeline::builder()`]. The pipeline is `Send + Sync` and can be
/// shared behind an `Arc`; concurrent queries read immutable index
/// snapshots while ingestion publishes new ones.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
    index: Arc<VectorIndex>,
    retriever: Retriever,
    composer: AnswerComposer,
    documents: RwLock<BTreeMap<String, usize>>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector index.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// IDs of the documents currently ingested, sorted.
    pub async fn document_ids(&self) -> Vec<String> {
        self.documents.read().await.keys().cloned().collect()
    }

    /// Ingest a single document: chunk → embed → index.
    ///
    /// Re-ingesting a known document replaces its chunks in one index
    /// generation, so the index never holds two copies. Returns the chunks
    /// that were indexed.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingFailure`] if embedding fails and
    /// [`RagError::DimensionMismatch`] if the provider returns vectors of the
    /// wrong length. Nothing is indexed in either case.
    pub async fn ingest(&self, document: &Document) -> Result<Vec<Chunk>> {
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            let mut tracked = self.documents.write().await;
            let removed = self.index.remove(&document.id);
            tracked.remove(&document.id);
            info!(
                document.id = %document.id,
                chunk_count = 0,
                removed,
                "ingested document (empty)"
            );
            return Ok(chunks);
        }

        let entries = self.embed_chunks(document, &chunks).await?;
        // The registry guard spans the publish so it always matches the index.
        let mut tracked = self.documents.write().await;
        let generation = self.index.replace_document(&document.id, entries).map_err(|e| {
            error!(document.id = %document.id, error = %e, "indexing failed during ingestion");
            e
        })?;

        let chunk_count = chunks.len();
        let replaced = tracked.insert(document.id.clone(), chunk_count).is_some();
        drop(tracked);
        info!(
            document.id = %document.id,
            chunk_count,
            replaced,
            generation = generation.generation(),
            "ingested document"
        );

        Ok(chunks)
    }

    /// Ingest multiple documents.
    ///
    /// Returns all chunks that were indexed across all documents.
    ///
    /// # Errors
    ///
    /// Returns the error of the first document that fails; documents before
    /// it stay ingested.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut all_chunks = Vec::new();
        for document in documents {
            let chunks = self.ingest(document).await?;
            all_chunks.extend(chunks);
        }
        Ok(all_chunks)
    }

    /// Remove a document's chunks from the index. Returns the number removed.
    pub async fn remove_document(&self, document_id: &str) -> usize {
        let mut tracked = self.documents.write().await;
        let removed = self.index.remove(document_id);
        tracked.remove(document_id);
        drop(tracked);
        info!(document.id = %document_id, removed, "removed document");
        removed
    }

    /// Replace the whole corpus with `documents` in a single index generation.
    ///
    /// # Errors
    ///
    /// Returns the first embedding or indexing error; the previous corpus
    /// stays published in that case.
    pub async fn rebuild(&self, documents: &[Document]) -> Result<()> {
        let mut entries = Vec::new();
        let mut counts = BTreeMap::new();
        for document in documents {
            let chunks = self.chunker.chunk(document);
            if chunks.is_empty() {
                continue;
            }
            counts.insert(document.id.clone(), chunks.len());
            entries.extend(self.embed_chunks(document, &chunks).await?);
        }

        let mut tracked = self.documents.write().await;
        let generation = self.index.rebuild(entries)?;
        *tracked = counts;
        info!(
            document_count = tracked.len(),
            entry_count = generation.len(),
            generation = generation.generation(),
            "rebuilt index"
        );
        Ok(())
    }

    /// Drop every document from the index.
    pub async fn clear(&self) {
        let mut tracked = self.documents.write().await;
        self.index.clear();
        tracked.clear();
        info!("cleared index");
    }

    /// Retrieve the chunks most relevant to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingFailure`] once retries are exhausted,
    /// [`RagError::Timeout`] if the query budget runs out, and propagates
    /// reranker errors.
    pub async fn query(&self, query: &str) -> Result<Vec<RetrievalResult>> {
        let span = async {
            let query_vector = self.embed_query(query).await?;
            self.retriever
                .retrieve_with_embedding(
                    query,
                    &query_vector,
                    self.config.top_k_dense,
                    self.config.top_k_keyword,
                    self.config.final_k,
                )
                .await
        };

        match self.config.query_timeout() {
            Some(budget) => tokio::time::timeout(budget, span).await.map_err(|_| {
                RagError::Timeout { budget_ms: budget.as_millis() as u64 }
            })?,
            None => span.await,
        }
    }

    /// Answer a question.
    ///
    /// Never fails: every error degrades to a fallback [`Answer`].
    pub async fn answer_query(&self, query: &str) -> Answer {
        if self.composer.is_sensitive(query) {
            info!(outcome = "escalated", "query matched safety denylist");
            return composer::escalated();
        }
        if self.index.is_empty() {
            info!(outcome = "no_evidence", "query against empty index");
            return composer::no_evidence();
        }

        let answer = match self.query(query).await {
            Ok(results) => {
                self.composer.compose(query, &results, self.config.confidence_threshold)
            }
            Err(RagError::Timeout { budget_ms }) => {
                warn!(budget_ms, "query timed out");
                composer::timed_out()
            }
            Err(RagError::EmptyIndex) => composer::no_evidence(),
            Err(e) => {
                error!(error = %e, "query failed");
                composer::unavailable()
            }
        };

        info!(
            outcome = ?answer.outcome,
            confidence = answer.confidence,
            citation_count = answer.citations.len(),
            "answered query"
        );
        answer
    }

    async fn embed_chunks(
        &self,
        document: &Document,
        chunks: &[Chunk],
    ) -> Result<Vec<IndexEntry>> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
            self.embedding_failure(e)
        })?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingFailure {
                provider: self.embedding_provider.name().to_string(),
                message: format!(
                    "expected {} embeddings for document '{}', got {}",
                    chunks.len(),
                    document.id,
                    embeddings.len()
                ),
            });
        }

        Ok(chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, mut vector)| {
                normalize(&mut vector);
                IndexEntry {
                    chunk_id: chunk.id.clone(),
                    vector,
                    document_id: document.id.clone(),
                    text: chunk.text.clone(),
                    title: document.title.clone(),
                }
            })
            .collect())
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let retries = self.config.embedding_retries;
        let backoff = std::time::Duration::from_millis(self.config.retry_backoff_ms);
        let mut attempt = 0;
        loop {
            match self.embedding_provider.embed(query).await {
                Ok(mut vector) => {
                    normalize(&mut vector);
                    return Ok(vector);
                }
                Err(e) if attempt < retries => {
                    attempt += 1;
                    warn!(attempt, retries, error = %e, "query embedding failed, retrying");
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
                Err(e) => {
                    error!(attempts = attempt + 1, error = %e, "query embedding failed");
                    return Err(self.embedding_failure(e));
                }
            }
        }
    }

    fn embedding_failure(&self, error: RagError) -> RagError {
        match error {
            RagError::EmbeddingFailure { .. } => error,
            other => RagError::EmbeddingFailure {
                provider: self.embedding_provider.name().to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config` and `embedding_provider` are required. The chunker defaults to a
/// [`TokenChunker`] built from the config, the index to an empty
/// [`VectorIndex`] sized to the provider, and the keyword stage to
/// [`TermOverlapScorer`] (set `top_k_keyword` to `0` to disable it).
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .reranker(Arc::new(reranker))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
    index: Option<Arc<VectorIndex>>,
    keyword_scorer: Option<Arc<dyn KeywordScorer>>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Use an existing vector index.
    pub fn index(mut self, index: Arc<VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Override the keyword scoring stage.
    pub fn keyword_scorer(mut self, scorer: Arc<dyn KeywordScorer>) -> Self {
        self.keyword_scorer = Some(scorer);
        self
    }

    /// Set an optional reranker for fused candidates.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if a required field is missing,
    /// the config fails validation, or a supplied index does not match the
    /// provider's dimensionality.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::InvalidConfig("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            RagError::InvalidConfig("embedding_provider is required".to_string())
        })?;

        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(TokenChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        let dimensions = embedding_provider.dimensions();
        let index = self.index.unwrap_or_else(|| Arc::new(VectorIndex::new(dimensions)));
        if index.dimensions() != dimensions {
            return Err(RagError::InvalidConfig(format!(
                "index dimensions ({}) differ from embedding provider dimensions ({dimensions})",
                index.dimensions()
            )));
        }

        let keyword_scorer = self.keyword_scorer.unwrap_or_else(|| Arc::new(TermOverlapScorer));
        let mut retriever = Retriever::new(embedding_provider.clone(), index.clone())
            .with_keyword_scorer(keyword_scorer)
            .with_config(&config);
        if let Some(reranker) = self.reranker {
            retriever = retriever.with_reranker(reranker);
        }

        let composer = AnswerComposer::from_config(&config)?;

        Ok(RagPipeline {
            config,
            embedding_provider,
            chunker,
            index,
            retriever,
            composer,
            documents: RwLock::new(BTreeMap::new()),
        })
    }
}
