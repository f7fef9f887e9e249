//! In-memory vector index with generation swapping.
//!
//! Every write builds a new immutable [`IndexGeneration`] and publishes it by
//! swapping an `Arc`. Readers take a snapshot and search it without holding
//! any lock, so a search always sees either the state before a write or the
//! state after it, never a partial update. Writers are serialized.
//!
//! Vectors must be L2-normalized by the caller before insertion and before
//! querying; scores are plain inner products and only equal cosine
//! similarity for unit vectors. The index does not check this.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use crate::document::IndexEntry;
use crate::embedding::dot;
use crate::error::{RagError, Result};

/// One immutable state of the index.
///
/// Entries are kept in insertion order, which breaks score ties.
#[derive(Debug, Default)]
pub struct IndexGeneration {
    generation: u64,
    dimensions: usize,
    entries: Vec<Arc<IndexEntry>>,
    positions: HashMap<String, usize>,
}

impl IndexGeneration {
    fn empty(generation: u64, dimensions: usize) -> Self {
        Self { generation, dimensions, entries: Vec::new(), positions: HashMap::new() }
    }

    fn from_entries(generation: u64, dimensions: usize, entries: Vec<Arc<IndexEntry>>) -> Self {
        let positions =
            entries.iter().enumerate().map(|(i, e)| (e.chunk_id.clone(), i)).collect();
        Self { generation, dimensions, entries, positions }
    }

    /// Monotonically increasing generation number; `0` is the initial empty index.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Vector dimensionality accepted by this index.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the generation holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter().map(|e| e.as_ref())
    }

    /// Look up an entry by chunk ID.
    pub fn get(&self, chunk_id: &str) -> Option<&IndexEntry> {
        self.positions.get(chunk_id).map(|&i| self.entries[i].as_ref())
    }

    /// Return the `top_k` entries most similar to `query`, best first.
    ///
    /// Ties keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyIndex`] if the generation holds no entries and
    /// [`RagError::DimensionMismatch`] if `query` has the wrong length.
    pub fn search_entries(&self, query: &[f32], top_k: usize) -> Result<Vec<(&IndexEntry, f32)>> {
        if self.entries.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        if query.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(&IndexEntry, f32)> =
            self.entries.iter().map(|e| (e.as_ref(), dot(&e.vector, query))).collect();
        // Stable sort: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Return `(chunk_id, score)` pairs for the `top_k` best matches.
    ///
    /// # Errors
    ///
    /// See [`search_entries`](IndexGeneration::search_entries).
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(String, f32)>> {
        Ok(self
            .search_entries(query, top_k)?
            .into_iter()
            .map(|(entry, score)| (entry.chunk_id.clone(), score))
            .collect())
    }
}

/// A vector index shared between concurrent readers and a single writer.
///
/// # Example
///
/// ```rust,ignore
/// use idocs_rag::VectorIndex;
///
/// let index = VectorIndex::new(384);
/// index.insert(entries)?;
/// let hits = index.search(&query_vector, 5)?;
/// ```
#[derive(Debug)]
pub struct VectorIndex {
    current: RwLock<Arc<IndexGeneration>>,
    writer: Mutex<()>,
}

impl VectorIndex {
    /// Create an empty index accepting vectors of `dimensions` length.
    pub fn new(dimensions: usize) -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexGeneration::empty(0, dimensions))),
            writer: Mutex::new(()),
        }
    }

    /// The current generation. The snapshot stays valid after later writes.
    pub fn snapshot(&self) -> Arc<IndexGeneration> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Vector dimensionality accepted by this index.
    pub fn dimensions(&self) -> usize {
        self.snapshot().dimensions
    }

    /// Number of entries in the current generation.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the current generation holds no entries.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Search the current generation.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyIndex`] before anything has been inserted.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(String, f32)>> {
        self.snapshot().search(query, top_k)
    }

    /// Upsert entries. An entry whose `chunk_id` already exists replaces the
    /// stored one in place.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if any vector has the wrong
    /// length; nothing is published in that case.
    pub fn insert(&self, entries: Vec<IndexEntry>) -> Result<Arc<IndexGeneration>> {
        self.try_publish(|current| {
            let mut next = current.entries.clone();
            upsert_into(&mut next, current.dimensions, entries)?;
            Ok(next)
        })
    }

    /// Delete every entry of a document. Returns the number removed.
    pub fn remove(&self, document_id: &str) -> usize {
        let mut removed = 0;
        self.publish_with(|current| {
            let next: Vec<_> =
                current.entries.iter().filter(|e| e.document_id != document_id).cloned().collect();
            removed = current.entries.len() - next.len();
            next
        });
        removed
    }

    /// Replace all entries of a document in one generation, so readers never
    /// observe the document missing.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if any vector has the wrong length.
    pub fn replace_document(
        &self,
        document_id: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<Arc<IndexGeneration>> {
        self.try_publish(|current| {
            let mut next: Vec<_> =
                current.entries.iter().filter(|e| e.document_id != document_id).cloned().collect();
            upsert_into(&mut next, current.dimensions, entries)?;
            Ok(next)
        })
    }

    /// Replace the whole corpus.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if any vector has the wrong length.
    pub fn rebuild(&self, entries: Vec<IndexEntry>) -> Result<Arc<IndexGeneration>> {
        self.try_publish(|current| {
            let mut next = Vec::with_capacity(entries.len());
            upsert_into(&mut next, current.dimensions, entries)?;
            Ok(next)
        })
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.publish_with(|_| Vec::new());
    }

    fn try_publish<F>(&self, build: F) -> Result<Arc<IndexGeneration>>
    where
        F: FnOnce(&IndexGeneration) -> Result<Vec<Arc<IndexEntry>>>,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let entries = build(&current)?;
        Ok(self.swap_in(&current, entries))
    }

    fn publish_with<F>(&self, build: F) -> Arc<IndexGeneration>
    where
        F: FnOnce(&IndexGeneration) -> Vec<Arc<IndexEntry>>,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let entries = build(&current);
        self.swap_in(&current, entries)
    }

    /// Caller holds the writer lock.
    fn swap_in(
        &self,
        current: &IndexGeneration,
        entries: Vec<Arc<IndexEntry>>,
    ) -> Arc<IndexGeneration> {
        let next = Arc::new(IndexGeneration::from_entries(
            current.generation + 1,
            current.dimensions,
            entries,
        ));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        debug!(generation = next.generation, entries = next.len(), "published index generation");
        next
    }
}

fn upsert_into(
    target: &mut Vec<Arc<IndexEntry>>,
    dimensions: usize,
    entries: Vec<IndexEntry>,
) -> Result<()> {
    if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimensions) {
        return Err(RagError::DimensionMismatch { expected: dimensions, actual: bad.vector.len() });
    }
    let mut positions: HashMap<String, usize> =
        target.iter().enumerate().map(|(i, e)| (e.chunk_id.clone(), i)).collect();
    for entry in entries {
        match positions.get(&entry.chunk_id) {
            Some(&i) => target[i] = Arc::new(entry),
            None => {
                positions.insert(entry.chunk_id.clone(), target.len());
                target.push(Arc::new(entry));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(chunk_id: &str, document_id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk_id: chunk_id.into(),
            vector,
            document_id: document_id.into(),
            text: format!("text of {chunk_id}"),
            title: format!("Title {document_id}"),
        }
    }

    #[test]
    fn search_before_insert_is_empty_index() {
        let index = VectorIndex::new(2);
        assert!(matches!(index.search(&[1.0, 0.0], 3), Err(RagError::EmptyIndex)));
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = VectorIndex::new(2);
        index
            .insert(vec![
                entry("b", "d1", vec![1.0, 0.0]),
                entry("a", "d1", vec![1.0, 0.0]),
                entry("c", "d2", vec![0.0, 1.0]),
            ])
            .unwrap();
        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let index = VectorIndex::new(2);
        index.insert(vec![entry("x", "d1", vec![1.0, 0.0])]).unwrap();
        index.insert(vec![entry("x", "d1", vec![0.0, 1.0])]).unwrap();
        assert_eq!(index.len(), 1);
        let hits = index.search(&[0.0, 1.0], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn remove_drops_only_that_document() {
        let index = VectorIndex::new(2);
        index
            .insert(vec![
                entry("a", "d1", vec![1.0, 0.0]),
                entry("b", "d1", vec![0.0, 1.0]),
                entry("c", "d2", vec![1.0, 0.0]),
            ])
            .unwrap();
        assert_eq!(index.remove("d1"), 2);
        assert_eq!(index.len(), 1);
        assert_eq!(index.remove("missing"), 0);
    }

    #[test]
    fn dimension_mismatch_publishes_nothing() {
        let index = VectorIndex::new(3);
        let before = index.snapshot().generation();
        let err = index.insert(vec![entry("a", "d1", vec![1.0, 0.0])]).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 2 }));
        assert_eq!(index.snapshot().generation(), before);
        assert!(index.is_empty());
    }

    #[test]
    fn snapshot_survives_later_writes() {
        let index = VectorIndex::new(2);
        index.insert(vec![entry("a", "d1", vec![1.0, 0.0])]).unwrap();
        let old = index.snapshot();
        index.replace_document("d1", vec![entry("a2", "d1", vec![0.0, 1.0])]).unwrap();
        assert!(old.get("a").is_some());
        assert!(index.snapshot().get("a").is_none());
        assert!(index.snapshot().generation() > old.generation());
    }

    #[test]
    fn rebuild_and_clear() {
        let index = VectorIndex::new(2);
        index.insert(vec![entry("a", "d1", vec![1.0, 0.0])]).unwrap();
        index.rebuild(vec![entry("z", "d9", vec![0.0, 1.0])]).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.snapshot().get("z").is_some());
        index.clear();
        assert!(index.is_empty());
    }

    #[test]
    fn remove_and_clear_always_publish() {
        let index = VectorIndex::new(2);
        index.insert(vec![entry("a", "d1", vec![1.0, 0.0])]).unwrap();
        let inserted = index.snapshot().generation();

        assert_eq!(index.remove("missing"), 0);
        assert_eq!(index.snapshot().generation(), inserted + 1);
        assert_eq!(index.len(), 1);

        index.clear();
        assert_eq!(index.snapshot().generation(), inserted + 2);
        assert!(index.is_empty());
    }
}
