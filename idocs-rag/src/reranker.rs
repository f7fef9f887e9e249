//! Reranker trait for re-scoring retrieval candidates.

use async_trait::async_trait;

use crate::document::RetrievalResult;
use crate::error::Result;

/// A reranker that reorders fused retrieval candidates.
///
/// Implementations can use cross-encoder models, LLM-based scoring, or
/// other strategies to improve precision beyond rank fusion. The retriever
/// truncates to `final_k` after reranking, so a reranker sees the whole
/// candidate list. The raw `score` of each result feeds answer confidence;
/// rerankers that rescore should write to `fused_score`.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank candidates given the original query.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievalResult>,
    ) -> Result<Vec<RetrievalResult>>;
}

/// A no-op reranker that returns candidates unchanged.
///
/// # Example
///
/// ```rust,ignore
/// use idocs_rag::NoOpReranker;
///
/// let reranker = NoOpReranker;
/// let reranked = reranker.rerank("query", results).await?;
/// // reranked == results (same order, same scores)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    async fn rerank(
        &self,
        _query: &str,
        candidates: Vec<RetrievalResult>,
    ) -> Result<Vec<RetrievalResult>> {
        Ok(candidates)
    }
}
