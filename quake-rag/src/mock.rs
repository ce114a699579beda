//! A scripted [`LanguageModel`] for tests and offline runs.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::grounding::GroundedPrompt;
use crate::llm::{GenerationSettings, LanguageModel};

/// One call received by a [`MockLanguageModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// The prompt the model was asked to complete.
    pub prompt: GroundedPrompt,
    /// The generation settings passed with it.
    pub settings: GenerationSettings,
}

#[derive(Debug, Clone)]
enum Behaviour {
    Reply(String),
    Fail(String),
}

/// A [`LanguageModel`] that returns a fixed reply (or a fixed failure) and
/// records every prompt it receives.
///
/// # Example
///
/// ```rust,ignore
/// let model = Arc::new(MockLanguageModel::replying("Evento 41671442, magnitudo 0.9."));
/// // ... ask a question through the engine ...
/// assert_eq!(model.call_count(), 1);
/// ```
#[derive(Debug)]
pub struct MockLanguageModel {
    behaviour: Behaviour,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockLanguageModel {
    /// A model that always answers `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self { behaviour: Behaviour::Reply(reply.into()), calls: Mutex::new(Vec::new()) }
    }

    /// A model whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { behaviour: Behaviour::Fail(message.into()), calls: Mutex::new(Vec::new()) }
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or_default()
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::replying("mock answer")
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(
        &self,
        prompt: &GroundedPrompt,
        settings: &GenerationSettings,
    ) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall { prompt: prompt.clone(), settings: *settings });
        }
        match &self.behaviour {
            Behaviour::Reply(reply) => Ok(reply.clone()),
            Behaviour::Fail(message) => Err(RagError::LanguageModel {
                provider: self.name().to_string(),
                message: message.clone(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> GroundedPrompt {
        GroundedPrompt {
            system: "Context:\n[1] Event ID: 1".into(),
            question: "q".into(),
            cited_record_ids: vec!["1".into()],
            chunks_used: 1,
            truncated: false,
        }
    }

    #[tokio::test]
    async fn records_prompts_and_replies() {
        let model = MockLanguageModel::replying("ok");
        let answer = model.complete(&prompt(), &GenerationSettings::default()).await.unwrap();
        assert_eq!(answer, "ok");
        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prompt, prompt());
        assert_eq!(calls[0].settings.temperature, 0.0);
    }

    #[tokio::test]
    async fn failing_model_reports_language_model_error() {
        let model = MockLanguageModel::failing("timed out");
        let err = model.complete(&prompt(), &GenerationSettings::default()).await.unwrap_err();
        assert!(matches!(err, RagError::LanguageModel { ref message, .. } if message == "timed out"));
        assert_eq!(model.call_count(), 1);
    }
}
