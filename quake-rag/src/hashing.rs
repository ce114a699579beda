//! Local feature-hashing embedder.
//!
//! [`HashingEmbedder`] needs no model files and no network: it hashes
//! lower-cased word unigrams and padded character trigrams into a fixed
//! number of signed buckets and L2-normalises the result. Lexical overlap
//! (place names, magnitude types, event ids) is what it captures, which is
//! most of what catalog questions ask about.

use async_trait::async_trait;
use tracing::debug;

use crate::embedding::{Embedder, ensure_not_empty};
use crate::error::Result;

const PROVIDER: &str = "Hashing";

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// A deterministic embedder built on the hashing trick.
///
/// Vectors are a pure function of `(dimensions, text)`; only integer hashing
/// and IEEE `f32` arithmetic in a fixed order are involved.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    model_id: String,
}

impl HashingEmbedder {
    /// Default number of buckets.
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Create an embedder producing vectors of `dimensions` components.
    ///
    /// # Panics
    ///
    /// Panics if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Self {
        assert!(dimensions > 0, "HashingEmbedder needs at least one dimension");
        Self { dimensions, model_id: format!("hashing-{dimensions}") }
    }

    fn accumulate(&self, vector: &mut [f32], kind: u8, feature: &str, weight: f32) {
        let hash = fnv1a(kind, feature.as_bytes());
        let bucket = (hash % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let mut vector = vec![0.0f32; self.dimensions];
        let mut saw_token = false;

        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            saw_token = true;
            self.accumulate(&mut vector, b'w', token, WORD_WEIGHT);

            let padded: Vec<char> =
                std::iter::once('^').chain(token.chars()).chain(std::iter::once('$')).collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut vector, b't', &trigram, TRIGRAM_WEIGHT);
            }
        }

        // Punctuation-only text still deserves a non-zero, text-specific vector.
        if !saw_token {
            self.accumulate(&mut vector, b'r', lowered.trim(), WORD_WEIGHT);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

fn fnv1a(kind: u8, bytes: &[u8]) -> u64 {
    std::iter::once(kind)
        .chain(bytes.iter().copied())
        .fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_not_empty(PROVIDER, text)?;
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
