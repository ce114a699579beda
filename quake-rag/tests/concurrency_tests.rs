//! Concurrent readers and writers on the flat index.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use quake_rag::document::{Chunk, Metadata};
use quake_rag::{DistanceMetric, FlatIndex, IndexEntry, VectorIndex};

const DIM: usize = 8;
const BASE: usize = 32;
const EXTRA: usize = 16;

fn entry(id: usize) -> IndexEntry {
    let embedding = (0..DIM).map(|d| ((id * 7 + d * 3) % 11) as f32 - 5.0).collect();
    IndexEntry {
        embedding,
        chunk: Chunk {
            id: format!("{id}_0"),
            text: format!("Event ID: {id}"),
            record_id: id.to_string(),
            metadata: Metadata::new(),
            sequence: 0,
        },
    }
}

fn base_entries() -> Vec<IndexEntry> {
    (0..BASE).map(entry).collect()
}

fn query() -> Vec<f32> {
    vec![1.0; DIM]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_see_whole_generations_during_build_and_add() {
    let index = Arc::new(FlatIndex::new(DistanceMetric::L2));
    index.build(base_entries()).await.unwrap();

    let reference: HashMap<String, f32> = index
        .search(&query(), BASE + EXTRA)
        .await
        .unwrap()
        .into_iter()
        .map(|hit| (hit.chunk.id, hit.score))
        .collect();
    assert_eq!(reference.len(), BASE);

    let done = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..4 {
        let index = Arc::clone(&index);
        let reference = reference.clone();
        let done = Arc::clone(&done);
        readers.push(tokio::spawn(async move {
            let mut observed = 0usize;
            while !done.load(Ordering::Acquire) || observed == 0 {
                let hits = index.search(&query(), BASE + EXTRA).await.unwrap();
                assert!(
                    hits.len() == BASE || hits.len() == BASE + EXTRA,
                    "torn snapshot with {} entries",
                    hits.len()
                );
                for pair in hits.windows(2) {
                    assert!(pair[0].distance <= pair[1].distance);
                }
                for hit in &hits {
                    if let Some(score) = reference.get(&hit.chunk.id) {
                        assert_eq!(hit.score.to_bits(), score.to_bits());
                    }
                }
                observed += 1;
                tokio::task::yield_now().await;
            }
            observed
        }));
    }

    for _ in 0..50 {
        index.add((BASE..BASE + EXTRA).map(entry).collect()).await.unwrap();
        index.build(base_entries()).await.unwrap();
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }
    assert_eq!(index.len().await, BASE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_are_serialised() {
    let index = Arc::new(FlatIndex::new(DistanceMetric::Cosine));
    index.build(Vec::new()).await.unwrap();

    let mut writers = Vec::new();
    for writer in 0..4 {
        let index = Arc::clone(&index);
        writers.push(tokio::spawn(async move {
            for i in 0..25 {
                index.add(vec![entry(writer * 100 + i)]).await.unwrap();
            }
        }));
    }
    for writer in writers {
        writer.await.unwrap();
    }

    assert_eq!(index.len().await, 100);
    let hits = index.search(&query(), 1000).await.unwrap();
    let mut ids: Vec<String> = hits.into_iter().map(|hit| hit.chunk.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 100);
}
