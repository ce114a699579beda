//! Configuration for the retrieval pipeline.
//!
//! [`RagConfig`] deserialises with per-field defaults so a config file only
//! needs to name what it overrides. Deserialisation does not validate; call
//! [`RagConfig::validate`] (or build through [`RagConfig::builder`]) before use.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::index::DistanceMetric;

/// Default number of results returned by a query.
pub const DEFAULT_TOP_K: usize = 8;

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 400;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 40;

/// Default embedding model identity.
pub const DEFAULT_EMBEDDING_MODEL: &str = "hashing-384";

/// Default character budget for the evidence block of a prompt.
pub const DEFAULT_CONTEXT_BUDGET_CHARS: usize = 6000;

/// Configuration parameters for the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of results to retrieve when the caller does not say otherwise.
    #[serde(alias = "k")]
    pub top_k: usize,
    /// Identity of the embedding model, e.g. `hashing-384` or
    /// `openai:text-embedding-3-small`. Determines vector dimensionality.
    #[serde(alias = "embedding_model_identity")]
    pub embedding_model: String,
    /// Distance metric used by the vector index.
    pub distance_metric: DistanceMetric,
    /// Minimum similarity score a hit needs to count as evidence.
    /// `None` means any retrieved hit counts.
    pub relevance_floor: Option<f32>,
    /// Maximum characters of rendered evidence placed in a prompt.
    pub context_budget_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            distance_metric: DistanceMetric::default(),
            relevance_floor: None,
            context_budget_chars: DEFAULT_CONTEXT_BUDGET_CHARS,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `context_budget_chars == 0`
    /// - `embedding_model` is blank
    /// - `relevance_floor` is not a finite number
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        validate_top_k(self.top_k)?;
        if self.context_budget_chars == 0 {
            return Err(RagError::Config(
                "context_budget_chars must be greater than zero".to_string(),
            ));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(RagError::Config("embedding_model must not be empty".to_string()));
        }
        if let Some(floor) = self.relevance_floor {
            if !floor.is_finite() {
                return Err(RagError::Config(format!(
                    "relevance_floor must be a finite number, got {floor}"
                )));
            }
        }
        Ok(())
    }
}

/// Reject a non-positive result count.
pub(crate) fn validate_top_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(RagError::Config("top_k must be greater than zero".to_string()));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the default number of results to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the embedding model identity.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the distance metric of the vector index.
    pub fn distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.config.distance_metric = metric;
        self
    }

    /// Set the minimum similarity a hit needs to count as evidence.
    pub fn relevance_floor(mut self, floor: f32) -> Self {
        self.config.relevance_floor = Some(floor);
        self
    }

    /// Set the character budget for the evidence block.
    pub fn context_budget_chars(mut self, budget: usize) -> Self {
        self.config.context_budget_chars = budget;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
