//! Property tests for fixed-size chunking.

use proptest::prelude::*;
use quake_rag::document::Metadata;
use quake_rag::{Chunker, Document, FixedSizeChunker};

/// Chunk size and an overlap strictly smaller than it.
fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (1usize..60).prop_flat_map(|size| (Just(size), 0..size))
}

fn document(text: String) -> Document {
    let mut metadata = Metadata::new();
    metadata.insert("event_id".into(), "41671442".into());
    metadata.insert("location".into(), "4 km SW Radicofani (SI)".into());
    Document { record_id: "41671442".into(), text, metadata }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// *For any* text no longer than `chunk_size`, exactly one chunk equal to
/// the text is produced.
mod prop_single_chunk {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn short_text_is_one_chunk(
            (size, overlap) in arb_sizes(),
            text in "\\PC{1,60}",
        ) {
            prop_assume!(char_len(&text) <= size);
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk(&document(text.clone()));
            prop_assert_eq!(chunks.len(), 1);
            prop_assert_eq!(&chunks[0].text, &text);
        }
    }
}

/// *For any* text longer than `chunk_size`, consecutive chunks overlap by
/// exactly `chunk_overlap` characters, each chunk respects the size bound,
/// and dropping the overlaps reconstructs the text.
mod prop_overlap_reconstruction {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn overlaps_are_exact_and_text_is_reconstructed(
            (size, overlap) in arb_sizes(),
            text in "\\PC{2,300}",
        ) {
            prop_assume!(char_len(&text) > size);
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let doc = document(text.clone());
            let chunks = chunker.chunk(&doc);

            prop_assert!(chunks.len() >= 2);

            let mut rebuilt = chunks[0].text.clone();
            for pair in chunks.windows(2) {
                let (prev, next) = (&pair[0].text, &pair[1].text);
                let prev_tail: String =
                    prev.chars().skip(char_len(prev) - overlap).collect();
                let next_head: String = next.chars().take(overlap).collect();
                prop_assert_eq!(prev_tail, next_head);
                rebuilt.extend(next.chars().skip(overlap));
            }
            prop_assert_eq!(rebuilt, text);

            for (sequence, chunk) in chunks.iter().enumerate() {
                prop_assert!(char_len(&chunk.text) <= size);
                prop_assert_eq!(chunk.sequence, sequence);
                prop_assert_eq!(&chunk.id, &format!("41671442_{sequence}"));
                prop_assert_eq!(&chunk.record_id, "41671442");
                prop_assert_eq!(&chunk.metadata, &doc.metadata);
            }
        }
    }
}

#[test]
fn default_sizes_are_accepted_and_overlap_equal_to_size_is_not() {
    assert!(FixedSizeChunker::new(400, 40).is_ok());
    assert!(FixedSizeChunker::new(400, 400).is_err());
}
