//! The language-model seam.
//!
//! The engine treats the model as a black box that turns a
//! [`GroundedPrompt`] into text. It never retries and never calls the model
//! when grounding decided to refuse.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grounding::GroundedPrompt;

/// Sampling settings sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Sampling temperature. Grounded answers use `0.0`.
    pub temperature: f32,
    /// Optional cap on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self { temperature: 0.0, max_tokens: None }
    }
}

/// A text-completion backend.
///
/// Implementations report failures as
/// [`RagError::LanguageModel`](crate::RagError::LanguageModel); a timeout is
/// a failure like any other.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce an answer for `prompt`.
    async fn complete(&self, prompt: &GroundedPrompt, settings: &GenerationSettings)
    -> Result<String>;

    /// Identifier used in logs and error messages.
    fn name(&self) -> &str;
}
