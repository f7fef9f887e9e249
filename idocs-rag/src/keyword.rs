//! Keyword search over an index snapshot.

use std::collections::{HashMap, HashSet};

use crate::index::IndexGeneration;
use crate::text::content_terms;

/// Lexical scoring stage that runs beside dense retrieval.
///
/// Implementations rank the entries of an [`IndexGeneration`] against the
/// query text and return `(chunk_id, score)` pairs, best first, omitting
/// entries that do not match at all.
pub trait KeywordScorer: Send + Sync {
    /// Return up to `top_k` matching chunks, best first.
    fn search(&self, query: &str, corpus: &IndexGeneration, top_k: usize) -> Vec<(String, f32)>;
}

/// Term-frequency overlap weighted by inverse document frequency.
///
/// Each query term contributes `(1 + ln tf) * ln(1 + N / df)` for the chunks
/// containing it, where `tf` is the term count in the chunk, `df` the number
/// of chunks containing the term and `N` the corpus size.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapScorer;

impl KeywordScorer for TermOverlapScorer {
    fn search(&self, query: &str, corpus: &IndexGeneration, top_k: usize) -> Vec<(String, f32)> {
        let query_terms: HashSet<String> = content_terms(query).into_iter().collect();
        if query_terms.is_empty() || corpus.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let frequencies: Vec<HashMap<&str, usize>> = corpus
            .entries()
            .map(|entry| {
                let mut tf = HashMap::new();
                for term in content_terms(&entry.text) {
                    if let Some(q) = query_terms.get(&term) {
                        *tf.entry(q.as_str()).or_insert(0) += 1;
                    }
                }
                tf
            })
            .collect();

        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        for tf in &frequencies {
            for term in tf.keys() {
                *document_frequency.entry(*term).or_insert(0) += 1;
            }
        }

        let total = corpus.len() as f32;
        let mut scored: Vec<(String, f32)> = corpus
            .entries()
            .zip(&frequencies)
            .filter(|(_, tf)| !tf.is_empty())
            .map(|(entry, tf)| {
                let score = tf
                    .iter()
                    .map(|(term, &count)| {
                        let df = document_frequency[term] as f32;
                        (1.0 + (count as f32).ln()) * (1.0 + total / df).ln()
                    })
                    .sum::<f32>();
                (entry.chunk_id.clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::IndexEntry;
    use crate::index::VectorIndex;

    fn corpus(texts: &[&str]) -> VectorIndex {
        let index = VectorIndex::new(1);
        index
            .insert(
                texts
                    .iter()
                    .enumerate()
                    .map(|(i, text)| IndexEntry {
                        chunk_id: format!("c{i}"),
                        vector: vec![1.0],
                        document_id: "d".into(),
                        text: text.to_string(),
                        title: "T".into(),
                    })
                    .collect(),
            )
            .unwrap();
        index
    }

    #[test]
    fn ranks_by_overlap_and_skips_misses() {
        let index = corpus(&[
            "Wear a hard hat.",
            "Draft pressure warning level is -250 mmH2O. Draft pressure shutdown at -300.",
            "Check draft fans weekly.",
        ]);
        let hits = TermOverlapScorer.search("draft pressure", &index.snapshot(), 10);
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[test]
    fn stopword_only_query_matches_nothing() {
        let index = corpus(&["What is the alarm limit?"]);
        assert!(TermOverlapScorer.search("what is the", &index.snapshot(), 5).is_empty());
    }
}
