//! Configuration for the RAG pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::fusion::DEFAULT_RRF_K;

/// Terms that route a question to a human instead of the documentation.
pub const DEFAULT_SAFETY_TERMS: &[&str] = &[
    "emergency shutdown",
    "bypass",
    "override",
    "interlock",
    "lockout",
    "explosion",
    "gas leak",
    "injury",
];

/// Configuration parameters for the RAG pipeline.
///
/// Every field has a default, so a partial JSON document deserializes into a
/// usable config. Call [`validate`](RagConfig::validate) after deserializing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in tokens.
    pub chunk_size: usize,
    /// Number of tokens shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of dense candidates taken from the vector index.
    pub top_k_dense: usize,
    /// Number of keyword candidates; `0` disables the keyword stage.
    pub top_k_keyword: usize,
    /// Number of chunks used to compose one answer.
    pub final_k: usize,
    /// Candidates whose similarity is below this floor are discarded.
    pub min_similarity: f32,
    /// Minimum top similarity for a non-fallback answer (inclusive).
    pub confidence_threshold: f32,
    /// Rank offset in reciprocal-rank fusion.
    pub rrf_k: f32,
    /// Fusion weight of the dense ranking.
    pub dense_weight: f32,
    /// Fusion weight of the keyword ranking.
    pub keyword_weight: f32,
    /// Extra attempts after a failed query embedding.
    pub embedding_retries: u32,
    /// Delay between embedding attempts, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Budget for the embedding + search span, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_timeout_ms: Option<u64>,
    /// Denylisted safety-critical terms (case-insensitive, whole words).
    pub safety_terms: Vec<String>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 64,
            top_k_dense: 10,
            top_k_keyword: 10,
            final_k: 3,
            min_similarity: 0.0,
            confidence_threshold: 0.3,
            rrf_k: DEFAULT_RRF_K,
            dense_weight: 1.0,
            keyword_weight: 1.0,
            embedding_retries: 2,
            retry_backoff_ms: 100,
            query_timeout_ms: None,
            safety_terms: DEFAULT_SAFETY_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parse a config from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if the JSON is malformed or the
    /// values fail [`validate`](RagConfig::validate).
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RagError::InvalidConfig(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// The query budget as a [`Duration`], if one is configured.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k_dense == 0` or `final_k == 0`
    /// - `confidence_threshold` is outside `[0, 1]`
    /// - `rrf_k` or a fusion weight is negative or not finite
    /// - `query_timeout_ms` is `Some(0)`
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.query_timeout_ms == Some(0) {
            return Err(RagError::InvalidConfig(
                "query_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.top_k_dense == 0 {
            return Err(RagError::InvalidConfig("top_k_dense must be greater than zero".into()));
        }
        if self.final_k == 0 {
            return Err(RagError::InvalidConfig("final_k must be greater than zero".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(RagError::InvalidConfig(format!(
                "confidence_threshold ({}) must be within [0, 1]",
                self.confidence_threshold
            )));
        }
        for (name, value) in [
            ("rrf_k", self.rrf_k),
            ("dense_weight", self.dense_weight),
            ("keyword_weight", self.keyword_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RagError::InvalidConfig(format!(
                    "{name} ({value}) must be a non-negative finite number"
                )));
            }
        }
        Ok(())
    }
}

/// Check chunking parameters on their own.
pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidConfig("chunk_size must be greater than zero".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::InvalidConfig(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

fn millis_ceil(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in tokens.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in tokens.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of dense candidates.
    pub fn top_k_dense(mut self, k: usize) -> Self {
        self.config.top_k_dense = k;
        self
    }

    /// Set the number of keyword candidates (`0` disables keyword search).
    pub fn top_k_keyword(mut self, k: usize) -> Self {
        self.config.top_k_keyword = k;
        self
    }

    /// Set the number of chunks used per answer.
    pub fn final_k(mut self, k: usize) -> Self {
        self.config.final_k = k;
        self
    }

    /// Set the similarity floor below which candidates are dropped.
    pub fn min_similarity(mut self, floor: f32) -> Self {
        self.config.min_similarity = floor;
        self
    }

    /// Set the confidence threshold for non-fallback answers.
    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        self.config.confidence_threshold = threshold;
        self
    }

    /// Set the reciprocal-rank-fusion offset.
    pub fn rrf_k(mut self, k: f32) -> Self {
        self.config.rrf_k = k;
        self
    }

    /// Set the fusion weights of the dense and keyword rankings.
    pub fn fusion_weights(mut self, dense: f32, keyword: f32) -> Self {
        self.config.dense_weight = dense;
        self.config.keyword_weight = keyword;
        self
    }

    /// Set how many times a failed query embedding is retried.
    pub fn embedding_retries(mut self, retries: u32) -> Self {
        self.config.embedding_retries = retries;
        self
    }

    /// Set the delay between embedding attempts.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff_ms = millis_ceil(backoff);
        self
    }

    /// Set the budget for the embedding + search span.
    ///
    /// Sub-millisecond remainders round up; a zero budget fails validation.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout_ms = Some(millis_ceil(timeout));
        self
    }

    /// Replace the safety denylist.
    pub fn safety_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.safety_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] under the conditions listed on
    /// [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_design() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.chunk_overlap, 64);
        assert_eq!(config.final_k, 3);
        assert!((config.confidence_threshold - 0.3).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk() {
        let err = RagConfig::builder().chunk_size(64).chunk_overlap(64).build().unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        let err = RagConfig::builder().confidence_threshold(1.5).build().unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            RagConfig::from_json(r#"{"chunk_size": 128, "query_timeout_ms": 3000}"#).unwrap();
        assert_eq!(config.chunk_size, 128);
        assert_eq!(config.chunk_overlap, 64);
        assert_eq!(config.query_timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn malformed_json_is_invalid_config() {
        assert!(matches!(RagConfig::from_json("{"), Err(RagError::InvalidConfig(_))));
    }

    #[test]
    fn zero_query_budget_is_rejected() {
        let err = RagConfig::builder().query_timeout(Duration::ZERO).build().unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
        assert!(RagConfig::from_json(r#"{"query_timeout_ms": 0}"#).is_err());
    }

    #[test]
    fn sub_millisecond_budget_rounds_up() {
        let config =
            RagConfig::builder().query_timeout(Duration::from_micros(250)).build().unwrap();
        assert_eq!(config.query_timeout_ms, Some(1));
        let config =
            RagConfig::builder().retry_backoff(Duration::from_micros(1500)).build().unwrap();
        assert_eq!(config.retry_backoff_ms, 2);
    }
}
