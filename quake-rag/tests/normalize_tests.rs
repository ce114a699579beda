//! Property tests for the shared normalizer.

use std::sync::Arc;

use proptest::prelude::*;
use quake_rag::{FlatIndex, HashingEmbedder, Retriever, normalize};

/// Text mixing words, every kind of whitespace the catalogs contain, and a
/// few invisible characters.
fn arb_messy_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            "[A-Za-z0-9().:/-]{1,8}",
            Just(" ".to_string()),
            Just("\t".to_string()),
            Just("\r\n".to_string()),
            Just("\n\n".to_string()),
            Just("\u{a0}".to_string()),
            Just("\u{feff}".to_string()),
            Just("\u{200b}".to_string()),
        ],
        0..40,
    )
    .prop_map(|parts| parts.concat())
}

mod prop_normalize {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn is_idempotent(text in arb_messy_text()) {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn is_idempotent_on_arbitrary_unicode(text in "\\PC*") {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn output_has_no_blank_lines_or_edge_whitespace(text in arb_messy_text()) {
            let out = normalize(&text);
            for line in out.split('\n') {
                prop_assert!(!line.is_empty());
                prop_assert_eq!(line.trim(), line);
                prop_assert!(!line.contains("  "));
                prop_assert!(!line.contains('\t'));
            }
        }

        /// The query path applies exactly the corpus-side normalizer.
        #[test]
        fn queries_are_cleaned_like_documents(text in arb_messy_text()) {
            let retriever = Retriever::new(
                Arc::new(HashingEmbedder::default()),
                Arc::new(FlatIndex::default()),
            );
            prop_assert_eq!(retriever.prepare_query(&text), normalize(&text));
        }
    }
}
