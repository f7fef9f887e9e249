//! Confidence-gated answer composition with enforced citations.
//!
//! [`AnswerComposer::compose`] classifies a query and its retrieval results
//! into one [`AnswerOutcome`] and renders it with the formatter for that
//! outcome. Confident answers are extractive: every quoted sentence is
//! borrowed from the text of the chunk it is cited under, so it occurs there
//! verbatim.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::config::RagConfig;
use crate::document::{Answer, AnswerOutcome, Citation, RetrievalResult};
use crate::error::{RagError, Result};
use crate::text::{content_terms, sentences};

/// Returned when retrieval found nothing.
pub const NO_EVIDENCE_MESSAGE: &str =
    "I'm sorry, I couldn't find any documentation that covers this question.";

/// Returned when the best match is below the confidence threshold.
pub const LOW_CONFIDENCE_MESSAGE: &str = "I couldn't find relevant information in the available \
     documents. Please try rephrasing your question or adding more detail.";

/// Returned for safety-critical questions.
pub const ESCALATION_MESSAGE: &str = "This question involves a safety-critical topic. Please \
     contact the control room or your shift supervisor and follow the official safety procedures.";

/// Returned when the query exceeds its time budget.
pub const TIMEOUT_MESSAGE: &str =
    "The documentation search took too long to complete. Please try again.";

/// Returned when the embedding provider keeps failing.
pub const UNAVAILABLE_MESSAGE: &str =
    "The documentation assistant is temporarily unavailable. Please try again shortly.";

const ANSWER_PREAMBLE: &str = "Based on the available documentation:";

const DEFAULT_MAX_SENTENCES_PER_SOURCE: usize = 3;

/// Turns retrieval results into an [`Answer`].
#[derive(Debug, Clone)]
pub struct AnswerComposer {
    safety_filter: Option<Regex>,
    max_sentences_per_source: usize,
}

impl AnswerComposer {
    /// Create a composer that escalates queries mentioning any of `safety_terms`.
    ///
    /// Terms match case-insensitively on word boundaries; whitespace inside a
    /// term matches any run of whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if the denylist cannot be compiled.
    pub fn new<S: AsRef<str>>(safety_terms: &[S]) -> Result<Self> {
        let alternatives: Vec<String> = safety_terms
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .map(|t| t.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s+"))
            .collect();

        let safety_filter = if alternatives.is_empty() {
            None
        } else {
            let pattern = format!(r"\b(?:{})\b", alternatives.join("|"));
            Some(RegexBuilder::new(&pattern).case_insensitive(true).build().map_err(|e| {
                RagError::InvalidConfig(format!("invalid safety denylist: {e}"))
            })?)
        };

        Ok(Self { safety_filter, max_sentences_per_source: DEFAULT_MAX_SENTENCES_PER_SOURCE })
    }

    /// Create a composer from the config's safety denylist.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if the denylist cannot be compiled.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(&config.safety_terms)
    }

    /// Limit how many sentences are quoted from one chunk.
    pub fn with_max_sentences_per_source(mut self, max: usize) -> Self {
        self.max_sentences_per_source = max.max(1);
        self
    }

    /// Whether the query touches a denylisted safety topic.
    pub fn is_sensitive(&self, query: &str) -> bool {
        self.safety_filter.as_ref().is_some_and(|re| re.is_match(query))
    }

    /// Decide which outcome a query and its results lead to.
    ///
    /// The threshold is inclusive: a top score equal to it is confident.
    pub fn classify(
        &self,
        query: &str,
        results: &[RetrievalResult],
        confidence_threshold: f32,
    ) -> AnswerOutcome {
        if self.is_sensitive(query) {
            return AnswerOutcome::Escalated;
        }
        match results.first() {
            None => AnswerOutcome::NoEvidence,
            Some(top) if top.score < confidence_threshold => AnswerOutcome::LowConfidence,
            Some(_) => AnswerOutcome::Confident,
        }
    }

    /// Compose the answer for a query.
    ///
    /// Confidence is the similarity of the top-ranked result.
    pub fn compose(
        &self,
        query: &str,
        results: &[RetrievalResult],
        confidence_threshold: f32,
    ) -> Answer {
        let outcome = self.classify(query, results, confidence_threshold);
        debug!(?outcome, result_count = results.len(), "composing answer");
        match outcome {
            AnswerOutcome::Escalated => escalated(),
            AnswerOutcome::NoEvidence => no_evidence(),
            AnswerOutcome::LowConfidence => low_confidence(results),
            AnswerOutcome::Confident => self.confident(query, results),
            AnswerOutcome::TimedOut => timed_out(),
            AnswerOutcome::Unavailable => unavailable(),
        }
    }

    fn confident(&self, query: &str, results: &[RetrievalResult]) -> Answer {
        let query_terms: HashSet<String> = content_terms(query).into_iter().collect();
        let mut emitted: HashSet<&str> = HashSet::new();
        let mut blocks: Vec<(Vec<&str>, &RetrievalResult)> = Vec::new();

        for result in results {
            let chosen: Vec<&str> = sentences(&result.text)
                .into_iter()
                .filter(|s| content_terms(s).iter().any(|t| query_terms.contains(t)))
                .filter(|s| emitted.insert(*s))
                .take(self.max_sentences_per_source)
                .collect();
            if !chosen.is_empty() {
                blocks.push((chosen, result));
            }
        }

        // Nothing overlaps lexically: quote the lead of the top chunk.
        if blocks.is_empty() {
            let top = &results[0];
            let lead: Vec<&str> =
                sentences(&top.text).into_iter().take(self.max_sentences_per_source).collect();
            blocks.push((lead, top));
        }

        // Every quote is a slice of the chunk it is cited under.
        let mut sections = Vec::new();
        let mut citations: Vec<Citation> = Vec::new();
        for (quoted, result) in blocks {
            if quoted.is_empty() {
                warn!(chunk_id = %result.chunk_id, "top chunk has no quotable sentences");
                continue;
            }
            sections.push(format!("{}\nSource: {}", quoted.join(" "), result.title));
            let citation = cite(result);
            if !citations.contains(&citation) {
                citations.push(citation);
            }
        }

        if sections.is_empty() {
            return no_evidence();
        }

        Answer {
            text: format!("{ANSWER_PREAMBLE}\n\n{}", sections.join("\n\n")),
            citations,
            confidence: results[0].score.clamp(0.0, 1.0),
            is_fallback: false,
            outcome: AnswerOutcome::Confident,
        }
    }
}

fn cite(result: &RetrievalResult) -> Citation {
    Citation { title: result.title.clone(), document_id: result.document_id.clone() }
}

fn fallback(text: impl Into<String>, outcome: AnswerOutcome) -> Answer {
    Answer { text: text.into(), citations: Vec::new(), confidence: 0.0, is_fallback: true, outcome }
}

/// Fallback for a query with no retrieved evidence.
pub fn no_evidence() -> Answer {
    fallback(NO_EVIDENCE_MESSAGE, AnswerOutcome::NoEvidence)
}

/// Fallback for a safety-critical query.
pub fn escalated() -> Answer {
    fallback(ESCALATION_MESSAGE, AnswerOutcome::Escalated)
}

/// Fallback for a query that exceeded its time budget.
pub fn timed_out() -> Answer {
    fallback(TIMEOUT_MESSAGE, AnswerOutcome::TimedOut)
}

/// Fallback for a query whose embedding could not be computed.
pub fn unavailable() -> Answer {
    fallback(UNAVAILABLE_MESSAGE, AnswerOutcome::Unavailable)
}

fn low_confidence(results: &[RetrievalResult]) -> Answer {
    let mut citations: Vec<Citation> = Vec::new();
    for result in results {
        let citation = cite(result);
        if !citations.contains(&citation) {
            citations.push(citation);
        }
    }
    let titles: Vec<&str> = citations.iter().map(|c| c.title.as_str()).collect();
    Answer {
        text: format!("{LOW_CONFIDENCE_MESSAGE}\nClosest matches: {}", titles.join(", ")),
        citations,
        confidence: results.first().map_or(0.0, |r| r.score.clamp(0.0, 1.0)),
        is_fallback: true,
        outcome: AnswerOutcome::LowConfidence,
    }
}
