//! Document chunking.
//!
//! Text is split into whitespace-delimited tokens. Sentence ends (`.`, `!`,
//! `?`) and paragraph breaks (a blank line) mark boundary units; the
//! [`TokenChunker`] packs whole units into windows of up to `chunk_size`
//! tokens and only cuts inside a unit when one unit alone is too large.
//! Every window after the first starts `chunk_overlap` tokens before the end
//! of the previous one.

use crate::config::validate_chunking;
use crate::document::{Chunk, Document};
use crate::error::Result;

/// A strategy for splitting documents into chunks.
///
/// Returned chunks are ordered by `sequence_index`. Embeddings are attached
/// later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no tokens.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Sentence-aware chunker with token-counted windows and overlap.
///
/// Chunk IDs are generated as `{document_id}_{sequence_index}`.
///
/// # Example
///
/// ```rust,ignore
/// use idocs_rag::{Chunker, TokenChunker};
///
/// let chunker = TokenChunker::new(512, 64)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct TokenChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TokenChunker {
    /// Create a new `TokenChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of tokens per chunk
    /// * `chunk_overlap`: number of tokens shared by consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`](crate::RagError::InvalidConfig) if
    /// `chunk_size == 0` or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Maximum tokens per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Tokens shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Chunker for TokenChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.raw_text;
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Vec::new();
        }

        pack_windows(&tokens, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, (first, last))| {
                let start_offset = if first == 0 { 0 } else { tokens[first].start };
                let end_offset = tokens.get(last).map_or(text.len(), |t| t.start);
                Chunk {
                    id: format!("{}_{sequence_index}", document.id),
                    document_id: document.id.clone(),
                    sequence_index,
                    text: text[start_offset..end_offset].to_string(),
                    token_count: last - first,
                    start_offset,
                    end_offset,
                }
            })
            .collect()
    }
}

/// Chunk a document with the given parameters.
///
/// # Errors
///
/// Returns [`RagError::InvalidConfig`](crate::RagError::InvalidConfig) if
/// `overlap_size >= chunk_size`.
pub fn chunk_document(
    document: &Document,
    chunk_size: usize,
    overlap_size: usize,
) -> Result<Vec<Chunk>> {
    Ok(TokenChunker::new(chunk_size, overlap_size)?.chunk(document))
}

/// Rebuild the original document text from its ordered chunks, dropping the
/// text each chunk shares with its predecessor.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start_offset);
        out.push_str(chunk.text.get(skip..).unwrap_or_default());
        covered = chunk.end_offset;
    }
    out
}

#[derive(Debug, Clone, Copy)]
struct Token {
    start: usize,
    end: usize,
    ends_unit: bool,
}

/// Split text into whitespace-delimited tokens and mark unit boundaries.
fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<usize> = None;

    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), current) {
            (true, Some(start)) => {
                tokens.push(Token { start, end: i, ends_unit: false });
                current = None;
            }
            (false, None) => current = Some(i),
            _ => {}
        }
    }
    if let Some(start) = current {
        tokens.push(Token { start, end: text.len(), ends_unit: false });
    }

    let count = tokens.len();
    for i in 0..count {
        let gap_end = tokens.get(i + 1).map_or(text.len(), |t| t.start);
        let gap = &text[tokens[i].end..gap_end];
        let word = &text[tokens[i].start..tokens[i].end];
        tokens[i].ends_unit =
            i + 1 == count || ends_sentence(word) || gap.matches('\n').count() >= 2;
    }
    tokens
}

fn ends_sentence(word: &str) -> bool {
    let trimmed = word.trim_end_matches(['"', '\'', ')', ']']);
    trimmed.ends_with(['.', '!', '?'])
}

/// Compute `[first, last)` token windows.
fn pack_windows(tokens: &[Token], chunk_size: usize, chunk_overlap: usize) -> Vec<(usize, usize)> {
    let total = tokens.len();
    let mut windows = Vec::new();
    let mut start = 0;

    loop {
        let limit = (start + chunk_size).min(total);
        let mut end = if limit == total {
            total
        } else {
            (start + 1..=limit).rev().find(|&b| tokens[b - 1].ends_unit).unwrap_or(limit)
        };
        // A window no longer than the overlap would never advance.
        if end < total && end - start <= chunk_overlap {
            end = limit;
        }

        windows.push((start, end));
        if end == total {
            break;
        }
        start = end - chunk_overlap;
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    fn doc(text: &str) -> Document {
        Document::new("doc", "Doc", text)
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let chunker = TokenChunker::new(8, 2).unwrap();
        assert!(chunker.chunk(&doc("")).is_empty());
        assert!(chunker.chunk(&doc("  \n\n  ")).is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        assert!(matches!(TokenChunker::new(4, 4), Err(RagError::InvalidConfig(_))));
        assert!(matches!(TokenChunker::new(0, 0), Err(RagError::InvalidConfig(_))));
        assert!(matches!(chunk_document(&doc("a b"), 2, 5), Err(RagError::InvalidConfig(_))));
    }

    #[test]
    fn short_document_is_single_chunk() {
        let text = "Normal operating temperature is 900 degrees Celsius.";
        let chunks = TokenChunker::new(512, 64).unwrap().chunk(&doc(text));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "doc_0");
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].token_count, 7);
    }

    #[test]
    fn prefers_sentence_boundaries() {
        let text = "One two three. Four five six. Seven eight nine.";
        let chunks = TokenChunker::new(7, 0).unwrap().chunk(&doc(text));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.trim_end(), "One two three. Four five six.");
        assert_eq!(chunks[1].text, "Seven eight nine.");
    }

    #[test]
    fn paragraph_break_is_a_boundary() {
        let text = "Daily checks\n\nRecord temperature readings from all sensors";
        let chunks = TokenChunker::new(4, 0).unwrap().chunk(&doc(text));
        assert_eq!(chunks[0].text.trim_end(), "Daily checks");
    }

    #[test]
    fn long_sentence_is_hard_cut() {
        let text = "a b c d e f g h i j";
        let chunks = TokenChunker::new(4, 1).unwrap().chunk(&doc(text));
        let counts: Vec<usize> = chunks.iter().map(|c| c.token_count).collect();
        assert_eq!(counts, vec![4, 4, 4]);
        assert!(chunks[1].text.starts_with("d "));
        assert!(chunks[2].text.starts_with("g "));
    }

    #[test]
    fn reassemble_skips_overlap_by_offset() {
        let chunks = TokenChunker::new(3, 1).unwrap().chunk(&doc("a b c d e"));
        assert_eq!(chunks[1].start_offset, 4);
        assert_eq!(reassemble(&chunks), "a b c d e");
        assert!(reassemble(&[]).is_empty());
    }

    #[test]
    fn reassemble_restores_text() {
        let text = "  Start up fans.\n\nIncrease fuel slowly. Monitor the temperature rise.  ";
        let chunks = TokenChunker::new(5, 2).unwrap().chunk(&doc(text));
        assert!(chunks.len() > 1);
        assert_eq!(reassemble(&chunks), text);
    }
}
