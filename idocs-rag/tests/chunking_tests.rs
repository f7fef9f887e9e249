//! Property tests for token chunking: coverage, overlap and size bounds.

use idocs_rag::{Chunker, Document, TokenChunker, reassemble};
use proptest::prelude::*;

/// Generate document text from words, sentence ends and mixed whitespace.
fn arb_text() -> impl Strategy<Value = String> {
    let word = ("[a-zA-Z0-9]{1,8}", prop_oneof![Just(""), Just("."), Just("?"), Just(",")]);
    let gap = prop_oneof![Just(" "), Just("  "), Just("\n"), Just("\n\n"), Just("\t")];
    (
        prop_oneof![Just(""), Just(" "), Just("\n")],
        proptest::collection::vec((word, gap), 0..120),
    )
        .prop_map(|(lead, parts)| {
            let mut text = lead.to_string();
            for ((stem, end), gap) in parts {
                text.push_str(&stem);
                text.push_str(end);
                text.push_str(gap);
            }
            text
        })
}

/// `(chunk_size, chunk_overlap)` with `overlap < size`.
fn arb_params() -> impl Strategy<Value = (usize, usize)> {
    (1usize..40).prop_flat_map(|size| (Just(size), 0..size))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn reassembly_restores_original_text(text in arb_text(), (size, overlap) in arb_params()) {
        let document = Document::new("doc", "Doc", text.clone());
        let chunks = TokenChunker::new(size, overlap).unwrap().chunk(&document);

        if text.split_whitespace().next().is_none() {
            prop_assert!(chunks.is_empty());
        } else {
            prop_assert_eq!(reassemble(&chunks), text);
        }
    }

    #[test]
    fn chunks_respect_size_and_overlap(text in arb_text(), (size, overlap) in arb_params()) {
        let document = Document::new("doc", "Doc", text.clone());
        let chunks = TokenChunker::new(size, overlap).unwrap().chunk(&document);

        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.sequence_index, i);
            prop_assert_eq!(&chunk.id, &format!("doc_{i}"));
            prop_assert!(chunk.token_count >= 1);
            prop_assert!(chunk.token_count <= size);
            prop_assert_eq!(chunk.token_count, chunk.text.split_whitespace().count());
            prop_assert_eq!(&chunk.text, &text[chunk.start_offset..chunk.end_offset]);
        }

        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            prop_assert!(next.start_offset > prev.start_offset);
            prop_assert!(next.start_offset <= prev.end_offset);

            let shared = &text[next.start_offset..prev.end_offset];
            prop_assert_eq!(shared.split_whitespace().count(), overlap);
            prop_assert!(prev.text.ends_with(shared));
            prop_assert!(next.text.starts_with(shared));
        }

        if let (Some(first), Some(last)) = (chunks.first(), chunks.last()) {
            prop_assert_eq!(first.start_offset, 0);
            prop_assert_eq!(last.end_offset, text.len());
        }
    }
}

#[test]
fn sample_manual_splits_on_sections() {
    let text = "NORMAL OPERATING CONDITIONS\n\
                The cyclone separator should operate within the following parameters.\n\n\
                STARTUP PROCEDURE\n\
                Verify all instrumentation is calibrated. Start combustion air fans.";
    let document = Document::new("ops", "Cyclone Operations Manual", text);
    let chunks = TokenChunker::new(12, 2).unwrap().chunk(&document);

    assert!(chunks.len() >= 2);
    assert!(chunks[0].text.contains("parameters."));
    assert!(chunks.iter().all(|c| c.document_id == "ops"));
    assert_eq!(reassemble(&chunks), text);
}
