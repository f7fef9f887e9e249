//! Deterministic feature-hashing embedder.
//!
//! Needs no model or network access, which makes it useful for demos, tests
//! and offline smoke runs. Each content term is hashed into one of
//! `dimensions` buckets and the bag-of-words vector is L2-normalized, so the
//! cosine similarity of two texts grows with the terms they share.

use async_trait::async_trait;

use crate::embedding::{EmbeddingProvider, normalize};
use crate::error::{RagError, Result};
use crate::text::content_terms;

/// Dimensionality of the reference sentence-embedding model.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Bag-of-words embedder using FNV-1a feature hashing.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    /// Create a provider producing vectors of `dimensions` length.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::InvalidConfig("embedding dimensions must be non-zero".into()));
        }
        Ok(Self { dimensions })
    }

    fn bucket(&self, term: &str) -> usize {
        let hash = term.bytes().fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
            (acc ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
        });
        (hash % self.dimensions as u64) as usize
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self { dimensions: DEFAULT_DIMENSIONS }
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for term in content_terms(text) {
            vector[self.bucket(&term)] += 1.0;
        }
        normalize(&mut vector);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::dot;

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let provider = HashingEmbeddingProvider::default();
        let a = provider.embed("Inlet gas temperature").await.unwrap();
        let b = provider.embed("Inlet gas temperature").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSIONS);
    }

    #[tokio::test]
    async fn shared_terms_raise_similarity() {
        let provider = HashingEmbeddingProvider::default();
        let query = provider.embed("What is the normal operating temperature?").await.unwrap();
        let related = provider
            .embed("Normal operating temperature is 900 degrees Celsius.")
            .await
            .unwrap();
        let unrelated = provider.embed("Wear a hard hat and safety boots.").await.unwrap();
        assert!(dot(&query, &related) > 0.5);
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert!(HashingEmbeddingProvider::new(0).is_err());
    }
}
