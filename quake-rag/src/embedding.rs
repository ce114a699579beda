//! Embedder trait for generating vector embeddings from text.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::hashing::HashingEmbedder;

/// A model that maps text to a fixed-dimension dense vector.
///
/// Embedding must be a pure function of the text: the same text under the
/// same model yields the same vector, bit for bit. Batching is a throughput
/// concern only; [`embed_batch`](Embedder::embed_batch) must return exactly
/// what calling [`embed`](Embedder::embed) per item would.
///
/// Callers reject empty text before it reaches an embedder; implementations
/// answer it with [`RagError::Embedding`] rather than a zero vector.
///
/// # Example
///
/// ```rust,ignore
/// use quake_rag::{Embedder, HashingEmbedder};
///
/// let embedder = HashingEmbedder::new(64);
/// let embedding = embedder.embed("terremoti vicino Radicofani").await?;
/// assert_eq!(embedding.len(), embedder.dimensions());
/// ```
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](Embedder::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this model.
    fn dimensions(&self) -> usize;

    /// Return the model identity, as accepted by [`embedder_from_model_id`].
    fn model_id(&self) -> &str;
}

/// Reject text that would be embedded as nothing.
pub(crate) fn ensure_not_empty(provider: &str, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(RagError::Embedding {
            provider: provider.to_string(),
            message: "cannot embed empty text".to_string(),
        });
    }
    Ok(())
}

/// Select an [`Embedder`] from a model identity string.
///
/// Recognised identities:
///
/// - `hashing` or `hashing-<dims>`: the local [`HashingEmbedder`]
/// - `fastembed:<model>`: a local sentence-transformer (feature
///   `fastembed`), e.g. `fastembed:all-MiniLM-L6-v2`
/// - `openai:<model>`: the OpenAI embeddings API (feature `openai`), key
///   read from `OPENAI_API_KEY`
///
/// # Errors
///
/// Returns [`RagError::Config`] for an unknown identity or an invalid
/// dimension, and whatever the remote provider returns on construction.
pub fn embedder_from_model_id(model_id: &str) -> Result<Arc<dyn Embedder>> {
    let model_id = model_id.trim();

    if let Some(rest) = model_id.strip_prefix("hashing") {
        let dimensions = match rest.strip_prefix('-') {
            None if rest.is_empty() => HashingEmbedder::DEFAULT_DIMENSIONS,
            Some(dims) => dims.parse::<usize>().ok().filter(|d| *d > 0).ok_or_else(|| {
                RagError::Config(format!("invalid dimension in embedding model '{model_id}'"))
            })?,
            None => {
                return Err(RagError::Config(format!("unknown embedding model '{model_id}'")));
            }
        };
        return Ok(Arc::new(HashingEmbedder::new(dimensions)));
    }

    if let Some(model) = model_id.strip_prefix("fastembed:") {
        #[cfg(feature = "fastembed")]
        return Ok(Arc::new(crate::onnx::FastEmbedder::new(model)?));
        #[cfg(not(feature = "fastembed"))]
        return Err(RagError::Config(format!(
            "embedding model '{model}' needs the `fastembed` feature"
        )));
    }

    if let Some(model) = model_id.strip_prefix("openai:") {
        #[cfg(feature = "openai")]
        return Ok(Arc::new(crate::openai::OpenAIEmbedder::from_env()?.with_model(model)));
        #[cfg(not(feature = "openai"))]
        return Err(RagError::Config(format!(
            "embedding model '{model}' needs the `openai` feature"
        )));
    }

    Err(RagError::Config(format!("unknown embedding model '{model_id}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_hashing_identities() {
        let default = embedder_from_model_id("hashing").unwrap();
        assert_eq!(default.dimensions(), HashingEmbedder::DEFAULT_DIMENSIONS);

        let small = embedder_from_model_id("hashing-64").unwrap();
        assert_eq!(small.dimensions(), 64);
        assert_eq!(small.model_id(), "hashing-64");
    }

    #[test]
    fn rejects_unknown_identities() {
        for id in ["hashing-0", "hashing-abc", "hashingfoo", "minilm", "fastembed:word2vec", ""] {
            assert!(
                matches!(embedder_from_model_id(id), Err(RagError::Config(_))),
                "accepted '{id}'"
            );
        }
    }
}
