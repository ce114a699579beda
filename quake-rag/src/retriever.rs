//! Query-time retrieval: normalize, embed, search.

use std::sync::Arc;

use tracing::{debug, error};

use crate::config::{DEFAULT_TOP_K, validate_top_k};
use crate::document::{SNIPPET_CHARS, SearchHit, snippet};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::normalize::normalize;

/// Wraps an [`Embedder`] and a [`VectorIndex`] with the query contract.
///
/// Queries go through the same [`normalize`] as catalog documents before
/// they are embedded. Retrieval mutates nothing, so a caller may drop the
/// future at any point without cleanup.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    default_k: usize,
}

impl Retriever {
    /// Create a retriever with the default `k` of [`DEFAULT_TOP_K`].
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index, default_k: DEFAULT_TOP_K }
    }

    /// Override the `k` used by [`retrieve_default`](Self::retrieve_default).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`](crate::RagError::Config) if `k` is zero.
    pub fn with_default_k(mut self, k: usize) -> Result<Self> {
        validate_top_k(k)?;
        self.default_k = k;
        Ok(self)
    }

    /// The `k` used when the caller does not pass one.
    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Clean a raw question exactly the way catalog text is cleaned.
    pub fn prepare_query(&self, query: &str) -> String {
        normalize(query)
    }

    /// Retrieve with the default `k`.
    pub async fn retrieve_default(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.retrieve(query, self.default_k).await
    }

    /// Return up to `k` hits for `query`, closest first.
    ///
    /// Once the index is built, a query that normalizes to nothing yields
    /// no hits without touching the embedder.
    ///
    /// # Errors
    ///
    /// - [`RagError::Config`](crate::RagError::Config) if `k` is zero
    /// - [`RagError::IndexNotBuilt`](crate::RagError::IndexNotBuilt) before
    ///   the first build
    /// - [`RagError::Embedding`](crate::RagError::Embedding) or
    ///   [`RagError::VectorIndex`](crate::RagError::VectorIndex) from the
    ///   collaborators
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        validate_top_k(k)?;

        if !self.index.is_built().await {
            return Err(RagError::IndexNotBuilt);
        }

        let query = self.prepare_query(query);
        if query.is_empty() {
            debug!("empty query, nothing to retrieve");
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(&query).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;

        let hits = self.index.search(&embedding, k).await.map_err(|e| {
            error!(error = %e, "vector index search failed");
            e
        })?;

        for (rank, hit) in hits.iter().enumerate() {
            debug!(
                rank = rank + 1,
                record_id = %hit.chunk.record_id,
                score = hit.score,
                snippet = %snippet(&hit.chunk.text, SNIPPET_CHARS),
                "retrieved"
            );
        }

        Ok(hits)
    }
}
