//! Hybrid retrieval: dense search, optional keyword search, rank fusion and
//! optional reranking.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::RetrievalResult;
use crate::embedding::{EmbeddingProvider, dot, normalize};
use crate::error::{RagError, Result};
use crate::fusion::{RankedList, reciprocal_rank_fusion};
use crate::index::VectorIndex;
use crate::keyword::KeywordScorer;
use crate::reranker::Reranker;

/// Retrieves the chunks most relevant to a query.
///
/// Dense candidates come from the [`VectorIndex`]; keyword candidates, when
/// a [`KeywordScorer`] is attached, come from the same index snapshot. Both
/// lists are merged with weighted reciprocal-rank fusion, passed through the
/// optional [`Reranker`], filtered by the similarity floor and truncated.
///
/// # Example
///
/// ```rust,ignore
/// let retriever = Retriever::new(provider, index)
///     .with_keyword_scorer(Arc::new(TermOverlapScorer))
///     .with_config(&config);
/// let results = retriever.retrieve("normal operating temperature", 10, 10, 3).await?;
/// ```
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    keyword_scorer: Option<Arc<dyn KeywordScorer>>,
    reranker: Option<Arc<dyn Reranker>>,
    min_similarity: f32,
    rrf_k: f32,
    dense_weight: f32,
    keyword_weight: f32,
}

impl Retriever {
    /// Create a dense-only retriever with default fusion parameters.
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>) -> Self {
        let defaults = RagConfig::default();
        Self {
            embedding_provider,
            index,
            keyword_scorer: None,
            reranker: None,
            min_similarity: defaults.min_similarity,
            rrf_k: defaults.rrf_k,
            dense_weight: defaults.dense_weight,
            keyword_weight: defaults.keyword_weight,
        }
    }

    /// Enable the keyword stage.
    pub fn with_keyword_scorer(mut self, scorer: Arc<dyn KeywordScorer>) -> Self {
        self.keyword_scorer = Some(scorer);
        self
    }

    /// Rerank fused candidates before truncation.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Take the similarity floor and fusion parameters from a config.
    pub fn with_config(mut self, config: &RagConfig) -> Self {
        self.min_similarity = config.min_similarity;
        self.rrf_k = config.rrf_k;
        self.dense_weight = config.dense_weight;
        self.keyword_weight = config.keyword_weight;
        self
    }

    /// Embed the query, then retrieve.
    ///
    /// Returns an empty list when the corpus is empty or nothing clears the
    /// similarity floor.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingFailure`] if the provider fails, and
    /// propagates reranker and dimension errors.
    pub async fn retrieve(
        &self,
        query_text: &str,
        top_k_dense: usize,
        top_k_keyword: usize,
        final_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let mut query_vector = self.embedding_provider.embed(query_text).await.map_err(|e| {
            error!(error = %e, "embedding failed during retrieval");
            match e {
                RagError::EmbeddingFailure { .. } => e,
                other => RagError::EmbeddingFailure {
                    provider: self.embedding_provider.name().to_string(),
                    message: other.to_string(),
                },
            }
        })?;
        normalize(&mut query_vector);
        self.retrieve_with_embedding(query_text, &query_vector, top_k_dense, top_k_keyword, final_k)
            .await
    }

    /// Retrieve using a query vector computed by the caller.
    ///
    /// `query_vector` must be L2-normalized.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the vector length differs
    /// from the index, and propagates reranker errors.
    pub async fn retrieve_with_embedding(
        &self,
        query_text: &str,
        query_vector: &[f32],
        top_k_dense: usize,
        top_k_keyword: usize,
        final_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let snapshot = self.index.snapshot();
        let dense = match snapshot.search(query_vector, top_k_dense) {
            Ok(hits) => hits,
            Err(RagError::EmptyIndex) => {
                debug!("retrieval against empty index");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let keyword = match &self.keyword_scorer {
            Some(scorer) if top_k_keyword > 0 => {
                scorer.search(query_text, &snapshot, top_k_keyword)
            }
            _ => Vec::new(),
        };

        let lists = [
            RankedList::new(&dense, self.dense_weight),
            RankedList::new(&keyword, self.keyword_weight),
        ];
        let fused = reciprocal_rank_fusion(&lists, self.rrf_k);

        let mut results: Vec<RetrievalResult> = fused
            .into_iter()
            .filter_map(|(chunk_id, fused_score)| {
                let entry = snapshot.get(&chunk_id)?;
                let score = dot(&entry.vector, query_vector);
                (score >= self.min_similarity).then(|| RetrievalResult {
                    chunk_id,
                    score,
                    fused_score,
                    text: entry.text.clone(),
                    title: entry.title.clone(),
                    document_id: entry.document_id.clone(),
                })
            })
            .collect();

        if let Some(reranker) = &self.reranker {
            results = reranker.rerank(query_text, results).await.map_err(|e| {
                error!(error = %e, "reranking failed");
                e
            })?;
        }
        results.truncate(final_k);

        info!(
            generation = snapshot.generation(),
            dense_count = dense.len(),
            keyword_count = keyword.len(),
            result_count = results.len(),
            "retrieval completed"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::IndexEntry;
    use crate::hashing::HashingEmbeddingProvider;
    use crate::keyword::TermOverlapScorer;

    async fn index_with(provider: &HashingEmbeddingProvider, texts: &[&str]) -> Arc<VectorIndex> {
        let index = Arc::new(VectorIndex::new(provider.dimensions()));
        let mut entries = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            entries.push(IndexEntry {
                chunk_id: format!("c{i}"),
                vector: provider.embed(text).await.unwrap(),
                document_id: format!("d{i}"),
                text: text.to_string(),
                title: format!("Doc {i}"),
            });
        }
        index.insert(entries).unwrap();
        index
    }

    #[tokio::test]
    async fn empty_corpus_returns_nothing() {
        let provider = Arc::new(HashingEmbeddingProvider::default());
        let index = Arc::new(VectorIndex::new(provider.dimensions()));
        let retriever = Retriever::new(provider, index);
        assert!(retriever.retrieve("anything", 5, 5, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keyword_stage_adds_lexical_matches() {
        let provider = HashingEmbeddingProvider::default();
        let index = index_with(
            &provider,
            &[
                "Inlet gas temperature alarm at 1000 degrees.",
                "Wear heat resistant clothing and a hard hat.",
                "Draft pressure emergency level is -300 mmH2O.",
            ],
        )
        .await;
        let retriever = Retriever::new(Arc::new(provider), index)
            .with_keyword_scorer(Arc::new(TermOverlapScorer));
        let results = retriever.retrieve("inlet temperature alarm", 1, 3, 3).await.unwrap();
        assert_eq!(results[0].chunk_id, "c0");
        assert!(results[0].score > 0.5);
        assert!(results[0].fused_score > 0.0);
    }

    #[tokio::test]
    async fn floor_filters_weak_candidates() {
        let provider = HashingEmbeddingProvider::default();
        let index = index_with(&provider, &["Steel-toed safety boots are required."]).await;
        let config = RagConfig::builder().min_similarity(0.9).build().unwrap();
        let retriever = Retriever::new(Arc::new(provider), index).with_config(&config);
        assert!(retriever.retrieve("draft pressure", 5, 0, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn truncates_to_final_k() {
        let provider = HashingEmbeddingProvider::default();
        let index = index_with(
            &provider,
            &["fuel supply check", "fuel flow increase", "fuel burner inspection"],
        )
        .await;
        let retriever = Retriever::new(Arc::new(provider), index)
            .with_keyword_scorer(Arc::new(TermOverlapScorer));
        let results = retriever.retrieve("fuel", 3, 3, 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn noop_reranker_keeps_fused_order() {
        let provider = HashingEmbeddingProvider::default();
        let index = index_with(
            &provider,
            &["fuel supply check", "combustion air flow", "fuel flow increase"],
        )
        .await;
        let provider = Arc::new(provider);
        let plain = Retriever::new(provider.clone(), index.clone())
            .with_keyword_scorer(Arc::new(TermOverlapScorer));
        let reranked = Retriever::new(provider, index)
            .with_keyword_scorer(Arc::new(TermOverlapScorer))
            .with_reranker(Arc::new(crate::reranker::NoOpReranker));

        let expected = plain.retrieve("fuel flow", 3, 3, 3).await.unwrap();
        assert_eq!(reranked.retrieve("fuel flow", 3, 3, 3).await.unwrap(), expected);
    }
}
