//! Vector index trait and distance metrics.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchHit};
use crate::error::{RagError, Result};

/// A stored `(embedding, chunk)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// The chunk's embedding.
    pub embedding: Vec<f32>,
    /// The chunk itself.
    pub chunk: Chunk,
}

/// How the index measures closeness between two vectors.
///
/// Every metric defines a `distance` (lower is closer, used for ranking) and
/// a `score` (higher is more similar, reported to callers and compared with
/// the relevance floor). The score is strictly decreasing in the distance,
/// so both orders agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Euclidean distance; score `1 / (1 + d)`.
    #[default]
    L2,
    /// `1 - cosine similarity`; score is the cosine similarity.
    Cosine,
    /// Negated inner product; score is the inner product.
    Dot,
}

impl DistanceMetric {
    /// Distance between `a` and `b`. Lower is closer.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt(),
            Self::Cosine => 1.0 - cosine_similarity(a, b),
            Self::Dot => -dot(a, b),
        }
    }

    /// Convert a distance produced by this metric into a similarity score.
    pub fn score(self, distance: f32) -> f32 {
        match self {
            Self::L2 => 1.0 / (1.0 + distance),
            Self::Cosine => 1.0 - distance,
            Self::Dot => -distance,
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
            Self::Dot => "dot",
        })
    }
}

impl FromStr for DistanceMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l2" | "euclidean" => Ok(Self::L2),
            "cosine" => Ok(Self::Cosine),
            "dot" | "ip" | "inner_product" => Ok(Self::Dot),
            other => Err(RagError::Config(format!("unknown distance metric '{other}'"))),
        }
    }
}

/// A nearest-neighbour index over chunk embeddings.
///
/// Writers (`build`, `add`) are serialised with respect to each other and
/// never expose a partially written state: a concurrent `search` sees the
/// index either before or after a write. `search` never mutates anything.
///
/// # Example
///
/// ```rust,ignore
/// use quake_rag::{DistanceMetric, FlatIndex, VectorIndex};
///
/// let index = FlatIndex::new(DistanceMetric::L2);
/// index.build(entries).await?;
/// let hits = index.search(&query_embedding, 8).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replace the whole index with `entries`, atomically for readers.
    async fn build(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Append `entries` after the existing ones without disturbing them.
    async fn add(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Return the `k` entries closest to `query`, ordered by ascending
    /// distance with ties broken by insertion order. Returns every entry if
    /// fewer than `k` are stored.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Number of stored entries (0 before the first build).
    async fn len(&self) -> usize;

    /// Whether the index has stored entries.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether `build` has completed at least once.
    async fn is_built(&self) -> bool;

    /// The metric this index ranks by.
    fn metric(&self) -> DistanceMetric;
}
