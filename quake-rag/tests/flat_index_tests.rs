//! Property tests for exact vector index search ordering.

use std::collections::HashSet;

use proptest::prelude::*;
use quake_rag::document::{Chunk, Metadata};
use quake_rag::{DistanceMetric, FlatIndex, IndexEntry, VectorIndex};

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

fn arb_metric() -> impl Strategy<Value = DistanceMetric> {
    prop_oneof![Just(DistanceMetric::L2), Just(DistanceMetric::Cosine), Just(DistanceMetric::Dot)]
}

fn entry(position: usize, embedding: Vec<f32>) -> IndexEntry {
    let record_id = position.to_string();
    IndexEntry {
        embedding,
        chunk: Chunk {
            id: format!("{record_id}_0"),
            text: format!("Event ID: {record_id}"),
            record_id,
            metadata: Metadata::new(),
            sequence: 0,
        },
    }
}

/// *For any* set of entries, metric, query and `k`, search returns at most
/// `k` hits, only indexed chunks, no chunk twice, sorted by ascending
/// distance with equal distances in insertion order, and scores that agree
/// with the metric.
mod prop_flat_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_sorted_bounded_and_indexed(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 0..20),
            query in arb_normalized_embedding(DIM),
            metric in arb_metric(),
            k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let count = embeddings.len();
            let entries: Vec<IndexEntry> =
                embeddings.into_iter().enumerate().map(|(i, e)| entry(i, e)).collect();

            let hits = rt.block_on(async {
                let index = FlatIndex::new(metric);
                index.build(entries.clone()).await.unwrap();
                index.search(&query, k).await.unwrap()
            });

            prop_assert_eq!(hits.len(), k.min(count));

            let mut seen = HashSet::new();
            for hit in &hits {
                let position: usize = hit.chunk.record_id.parse().unwrap();
                prop_assert!(position < count);
                prop_assert_eq!(&hit.chunk, &entries[position].chunk);
                prop_assert!(seen.insert(position), "chunk returned twice");
                prop_assert_eq!(hit.distance, metric.distance(&entries[position].embedding, &query));
                prop_assert_eq!(hit.score, metric.score(hit.distance));
            }

            for window in hits.windows(2) {
                let (a, b) = (&window[0], &window[1]);
                prop_assert!(a.distance <= b.distance, "not ascending: {} > {}", a.distance, b.distance);
                if a.distance == b.distance {
                    let pa: usize = a.chunk.record_id.parse().unwrap();
                    let pb: usize = b.chunk.record_id.parse().unwrap();
                    prop_assert!(pa < pb, "tie not broken by insertion order");
                }
            }
        }

        #[test]
        fn duplicated_vectors_keep_insertion_order(
            embedding in arb_normalized_embedding(DIM),
            copies in 2usize..8,
            metric in arb_metric(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let entries: Vec<IndexEntry> =
                (0..copies).map(|i| entry(i, embedding.clone())).collect();

            let hits = rt.block_on(async {
                let index = FlatIndex::new(metric);
                index.build(entries).await.unwrap();
                index.search(&embedding, copies).await.unwrap()
            });

            let order: Vec<String> = hits.iter().map(|h| h.chunk.record_id.clone()).collect();
            let expected: Vec<String> = (0..copies).map(|i| i.to_string()).collect();
            prop_assert_eq!(order, expected);
        }

        #[test]
        fn rebuilding_is_reproducible(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 1..15),
            query in arb_normalized_embedding(DIM),
            k in 1usize..10,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let entries: Vec<IndexEntry> =
                embeddings.into_iter().enumerate().map(|(i, e)| entry(i, e)).collect();

            let (first, second) = rt.block_on(async {
                let index = FlatIndex::default();
                index.build(entries.clone()).await.unwrap();
                let first = index.search(&query, k).await.unwrap();
                index.build(entries).await.unwrap();
                let second = index.search(&query, k).await.unwrap();
                (first, second)
            });

            prop_assert_eq!(first, second);
        }
    }
}
