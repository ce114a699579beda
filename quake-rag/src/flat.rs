//! Exact in-memory vector index.
//!
//! [`FlatIndex`] compares the query against every stored vector, so results
//! are exact and reproducible at linear cost per query. The stored entries
//! live in an immutable snapshot behind an `Arc`; writers build the next
//! snapshot off to the side and swap it in, readers clone the `Arc` and scan
//! without holding any lock.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::document::SearchHit;
use crate::error::{RagError, Result};
use crate::index::{DistanceMetric, IndexEntry, VectorIndex};

const BACKEND: &str = "Flat";

/// An immutable generation of the index.
#[derive(Debug, Default)]
struct Snapshot {
    /// Dimensionality shared by every entry; `None` while empty.
    dimensions: Option<usize>,
    /// Entries in insertion order; the position is the tie-breaker.
    entries: Vec<IndexEntry>,
}

/// An exact nearest-neighbour index with snapshot swapping.
///
/// # Example
///
/// ```rust,ignore
/// use quake_rag::{DistanceMetric, FlatIndex, VectorIndex};
///
/// let index = FlatIndex::new(DistanceMetric::Cosine);
/// index.build(entries).await?;
/// let hits = index.search(&query, 5).await?;
/// ```
#[derive(Debug)]
pub struct FlatIndex {
    metric: DistanceMetric,
    /// `None` until the first successful build.
    current: RwLock<Option<Arc<Snapshot>>>,
    /// Serialises `build` and `add`.
    writer: Mutex<()>,
}

impl FlatIndex {
    /// Create an index that has not been built yet.
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric, current: RwLock::new(None), writer: Mutex::new(()) }
    }

    async fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current.read().await.clone()
    }

    async fn publish(&self, snapshot: Snapshot) {
        *self.current.write().await = Some(Arc::new(snapshot));
    }
}

impl Default for FlatIndex {
    fn default() -> Self {
        Self::new(DistanceMetric::default())
    }
}

fn dimension_error(expected: usize, found: usize) -> RagError {
    RagError::VectorIndex {
        backend: BACKEND.to_string(),
        message: format!("embedding has {found} dimensions, index expects {expected}"),
    }
}

/// Check that every entry has `expected` dimensions, or agree on the first
/// entry's dimensionality when `expected` is `None`.
fn check_dimensions(expected: Option<usize>, entries: &[IndexEntry]) -> Result<Option<usize>> {
    let mut dimensions = expected;
    for entry in entries {
        let found = entry.embedding.len();
        if found == 0 {
            return Err(RagError::VectorIndex {
                backend: BACKEND.to_string(),
                message: format!("chunk '{}' has an empty embedding", entry.chunk.id),
            });
        }
        match dimensions {
            Some(expected) if expected != found => return Err(dimension_error(expected, found)),
            Some(_) => {}
            None => dimensions = Some(found),
        }
    }
    Ok(dimensions)
}

#[async_trait]
impl VectorIndex for FlatIndex {
    async fn build(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let _writer = self.writer.lock().await;
        let dimensions = check_dimensions(None, &entries)?;
        let count = entries.len();
        self.publish(Snapshot { dimensions, entries }).await;
        info!(backend = BACKEND, entries = count, metric = %self.metric, "index built");
        Ok(())
    }

    async fn add(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let _writer = self.writer.lock().await;
        let previous = self.snapshot().await.ok_or(RagError::IndexNotBuilt)?;
        let dimensions = check_dimensions(previous.dimensions, &entries)?;

        let added = entries.len();
        let mut next = Vec::with_capacity(previous.entries.len() + added);
        next.extend(previous.entries.iter().cloned());
        next.extend(entries);
        let total = next.len();

        self.publish(Snapshot { dimensions, entries: next }).await;
        info!(backend = BACKEND, added, total, "index extended");
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        let snapshot = self.snapshot().await.ok_or(RagError::IndexNotBuilt)?;
        if let Some(expected) = snapshot.dimensions {
            if expected != query.len() {
                return Err(dimension_error(expected, query.len()));
            }
        }

        let mut ranked: Vec<(f32, usize)> = snapshot
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (self.metric.distance(&entry.embedding, query), position))
            .collect();

        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        ranked.truncate(k);

        let hits: Vec<SearchHit> = ranked
            .into_iter()
            .map(|(distance, position)| SearchHit {
                chunk: snapshot.entries[position].chunk.clone(),
                distance,
                score: self.metric.score(distance),
            })
            .collect();

        debug!(backend = BACKEND, k, hits = hits.len(), "search completed");
        Ok(hits)
    }

    async fn len(&self) -> usize {
        self.snapshot().await.map_or(0, |s| s.entries.len())
    }

    async fn is_built(&self) -> bool {
        self.current.read().await.is_some()
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }
}
