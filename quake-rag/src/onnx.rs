//! Local sentence-embedding models run through ONNX Runtime.
//!
//! Only available with the `fastembed` feature. Model files are downloaded
//! once into the fastembed cache and then run offline.

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, error, info};

use crate::embedding::{Embedder, ensure_not_empty};
use crate::error::{RagError, Result};

const PROVIDER: &str = "fastembed";

/// The model used when none is named.
pub const DEFAULT_FASTEMBED_MODEL: &str = "all-MiniLM-L6-v2";

/// Supported model names, their fastembed model, and output size.
fn lookup(name: &str) -> Option<(EmbeddingModel, usize)> {
    match name {
        "all-MiniLM-L6-v2" => Some((EmbeddingModel::AllMiniLML6V2, 384)),
        "paraphrase-multilingual-MiniLM-L12-v2" => Some((EmbeddingModel::ParaphraseMLMiniLML12V2, 384)),
        "bge-small-en-v1.5" => Some((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Some((EmbeddingModel::BGEBaseENV15, 768)),
        _ => None,
    }
}

fn failure(message: String) -> RagError {
    RagError::Embedding { provider: PROVIDER.to_string(), message }
}

/// An [`Embedder`] running a sentence-transformer locally.
///
/// Failures surface as [`RagError::Embedding`]; no zero vector ever stands
/// in for a text the model could not embed.
///
/// # Example
///
/// ```rust,ignore
/// use quake_rag::FastEmbedder;
///
/// let embedder = FastEmbedder::new("all-MiniLM-L6-v2")?;
/// let embedding = embedder.embed("Location: 4 km SW Radicofani (SI)").await?;
/// assert_eq!(embedding.len(), 384);
/// ```
pub struct FastEmbedder {
    model: TextEmbedding,
    model_id: String,
    dimensions: usize,
}

impl FastEmbedder {
    /// Load `name`, downloading its files on first use.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] for an unsupported model name and
    /// [`RagError::Embedding`] when the model cannot be loaded.
    pub fn new(name: &str) -> Result<Self> {
        let (model_name, dimensions) = lookup(name)
            .ok_or_else(|| RagError::Config(format!("unsupported fastembed model '{name}'")))?;

        let model = TextEmbedding::try_new(
            InitOptions::new(model_name).with_show_download_progress(false),
        )
        .map_err(|e| {
            error!(model = name, error = %e, "failed to load embedding model");
            failure(format!("failed to load '{name}': {e}"))
        })?;

        info!(model = name, dimensions, "embedding model loaded");
        Ok(Self { model, model_id: format!("fastembed:{name}"), dimensions })
    }

    fn check(&self, embeddings: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>> {
        if embeddings.len() != expected {
            return Err(failure(format!(
                "expected {expected} embeddings, got {}",
                embeddings.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(failure(format!(
                "model returned {} dimensions, expected {}",
                bad.len(),
                self.dimensions
            )));
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_not_empty(PROVIDER, text)?;
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let embeddings = self
            .model
            .embed(vec![text], None)
            .map_err(|e| failure(format!("embedding failed: {e}")))?;
        let mut embeddings = self.check(embeddings, 1)?;
        embeddings.pop().ok_or_else(|| failure("model returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        for text in texts {
            ensure_not_empty(PROVIDER, text)?;
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, count = texts.len(), "embedding batch");

        // Padding inside a larger batch can perturb the pooled vector, so
        // each text runs alone to match `embed` exactly.
        let embeddings = self.model.embed(texts.to_vec(), Some(1)).map_err(|e| {
            error!(provider = PROVIDER, error = %e, "batch embedding failed");
            failure(format!("batch embedding failed: {e}"))
        })?;
        self.check(embeddings, texts.len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
