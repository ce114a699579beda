//! The question-answering engine.
//!
//! [`QuakeRag`] owns the build path (record → document → chunks →
//! embeddings → index) and the query path (question → retrieval → grounding
//! → model → [`Answer`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use quake_rag::{MockLanguageModel, QuakeRag, RagConfig};
//!
//! let engine = QuakeRag::builder()
//!     .config(RagConfig::default())
//!     .language_model(Arc::new(MockLanguageModel::replying("...")))
//!     .build()?;
//!
//! engine.ingest_dir("data/").await?;
//! let answer = engine.ask("terremoti vicino Radicofani").await?;
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::{RagConfig, validate_top_k};
use crate::document::{Chunk, RetrievedEvidence, SearchHit};
use crate::embedding::{Embedder, embedder_from_model_id};
use crate::error::{RagError, Result};
use crate::flat::FlatIndex;
use crate::grounding::{Grounding, GroundingAssembler, REFUSAL};
use crate::index::{IndexEntry, VectorIndex};
use crate::llm::{GenerationSettings, LanguageModel};
use crate::loader::{LoadReport, load_dir};
use crate::normalize::render_document;
use crate::record::EventRecord;
use crate::retriever::Retriever;

/// Whether an answer came from the model or is the fixed refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The model answered from retrieved evidence.
    Grounded,
    /// No usable evidence; the answer is [`REFUSAL`].
    Refused,
}

/// The response to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text.
    pub answer: String,
    /// Records whose evidence was placed in the prompt, rank order, no
    /// duplicates. Empty on refusal.
    pub cited_record_ids: Vec<String>,
    /// Everything the retriever returned, closest first.
    pub retrieved: Vec<RetrievedEvidence>,
    /// How the answer was produced.
    pub outcome: Outcome,
}

impl Answer {
    fn refusal(hits: &[SearchHit]) -> Self {
        Self {
            answer: REFUSAL.to_string(),
            cited_record_ids: Vec::new(),
            retrieved: hits.iter().map(RetrievedEvidence::from).collect(),
            outcome: Outcome::Refused,
        }
    }

    /// Whether this is the fixed refusal.
    pub fn is_refusal(&self) -> bool {
        self.outcome == Outcome::Refused
    }
}

/// Counts from one build or add.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Records indexed.
    pub records: usize,
    /// Chunks indexed.
    pub chunks: usize,
    /// Records skipped because their identifier was already indexed.
    pub duplicates: usize,
}

/// Grounded question answering over an event catalog.
///
/// Construct one via [`QuakeRag::builder()`]. The engine holds no global
/// state; several engines over different catalogs can coexist.
pub struct QuakeRag {
    config: RagConfig,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chunker: Arc<dyn Chunker>,
    model: Option<Arc<dyn LanguageModel>>,
    retriever: Retriever,
    assembler: GroundingAssembler,
    settings: GenerationSettings,
    /// Identifiers currently indexed. Held for the whole of a build or add,
    /// which serialises writers at this level too.
    indexed_ids: Mutex<HashSet<String>>,
}

impl QuakeRag {
    /// Create a new [`QuakeRagBuilder`].
    pub fn builder() -> QuakeRagBuilder {
        QuakeRagBuilder::default()
    }

    /// The engine configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The embedder used on both paths.
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// The vector index.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// The query-side retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Turn records into index entries, skipping identifiers in `seen`.
    async fn prepare(
        &self,
        records: &[EventRecord],
        seen: &mut HashSet<String>,
    ) -> Result<(Vec<IndexEntry>, IndexReport)> {
        let mut report = IndexReport::default();
        let mut chunks = Vec::new();

        for record in records {
            if !seen.insert(record.event_id.clone()) {
                warn!(event_id = %record.event_id, "skipping duplicate event id");
                report.duplicates += 1;
                continue;
            }
            let document = render_document(record);
            // A one-character window can land on a lone separator.
            let mut kept: Vec<Chunk> = self
                .chunker
                .chunk(&document)
                .into_iter()
                .filter(|c| !c.text.trim().is_empty())
                .collect();
            for (sequence, chunk) in kept.iter_mut().enumerate() {
                chunk.sequence = sequence;
                chunk.id = format!("{}_{sequence}", chunk.record_id);
            }
            chunks.extend(kept);
            report.records += 1;
        }
        report.chunks = chunks.len();

        if chunks.is_empty() {
            return Ok((Vec::new(), report));
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await.map_err(|e| {
            error!(error = %e, chunks = texts.len(), "embedding failed during indexing");
            e
        })?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::Embedding {
                provider: self.embedder.model_id().to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    chunks.len(),
                    embeddings.len()
                ),
            });
        }

        let entries = embeddings
            .into_iter()
            .zip(chunks)
            .map(|(embedding, chunk)| IndexEntry { embedding, chunk })
            .collect();
        Ok((entries, report))
    }

    /// Replace the index with `records`.
    ///
    /// Building from zero records is valid and yields an empty index that
    /// answers every question with the refusal. Repeated builds from the
    /// same records give identical rankings and scores. If embedding or
    /// indexing fails, the previous index stays in place.
    pub async fn build(&self, records: &[EventRecord]) -> Result<IndexReport> {
        let mut indexed_ids = self.indexed_ids.lock().await;
        let mut seen = HashSet::new();
        let (entries, report) = self.prepare(records, &mut seen).await?;

        self.index.build(entries).await.map_err(|e| {
            error!(error = %e, "index build failed");
            e
        })?;
        *indexed_ids = seen;

        info!(
            records = report.records,
            chunks = report.chunks,
            duplicates = report.duplicates,
            embedding_model = %self.embedder.model_id(),
            "catalog indexed"
        );
        Ok(report)
    }

    /// Add `records` to an already built index.
    ///
    /// Records whose identifier is already indexed are skipped. Existing
    /// entries keep their positions and scores.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotBuilt`] before the first [`build`](Self::build).
    pub async fn add_records(&self, records: &[EventRecord]) -> Result<IndexReport> {
        let mut indexed_ids = self.indexed_ids.lock().await;
        if !self.index.is_built().await {
            return Err(RagError::IndexNotBuilt);
        }

        let mut seen = indexed_ids.clone();
        let (entries, report) = self.prepare(records, &mut seen).await?;
        if !entries.is_empty() {
            self.index.add(entries).await.map_err(|e| {
                error!(error = %e, "index add failed");
                e
            })?;
        }
        *indexed_ids = seen;

        info!(
            records = report.records,
            chunks = report.chunks,
            duplicates = report.duplicates,
            "records added"
        );
        Ok(report)
    }

    /// Load every catalog file under `dir` and build the index from it.
    pub async fn ingest_dir(&self, dir: impl AsRef<Path>) -> Result<LoadReport> {
        let report = load_dir(dir)?;
        self.build(&report.records).await?;
        Ok(report)
    }

    /// Retrieve up to `k` hits for `query` without calling the model.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.retriever.retrieve(query, k).await
    }

    /// Answer `question` using the configured `top_k`.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        self.ask_with_k(question, self.config.top_k).await
    }

    /// Answer `question` from at most `k` retrieved chunks.
    ///
    /// With no usable evidence this returns the refusal without calling the
    /// model.
    ///
    /// # Errors
    ///
    /// - [`RagError::Config`] if `k` is zero
    /// - retrieval errors, including [`RagError::IndexNotBuilt`]
    /// - [`RagError::LanguageModel`] if the model fails; no answer is
    ///   produced in that case
    /// - [`RagError::Config`] if evidence was found but no language model
    ///   is configured
    pub async fn ask_with_k(&self, question: &str, k: usize) -> Result<Answer> {
        validate_top_k(k)?;
        let hits = self.retriever.retrieve(question, k).await?;

        let prompt = match self.assembler.assemble(question, &hits) {
            Grounding::Refuse => {
                info!(retrieved = hits.len(), outcome = "refused", "question answered");
                return Ok(Answer::refusal(&hits));
            }
            Grounding::Prompt(prompt) => prompt,
        };

        let model = self.model.as_ref().ok_or_else(|| {
            RagError::Config("no language model configured; only retrieval is available".into())
        })?;
        let text = model.complete(&prompt, &self.settings).await.map_err(|e| {
            error!(model = %model.name(), error = %e, "language model failed");
            e
        })?;

        info!(
            retrieved = hits.len(),
            cited = prompt.cited_record_ids.len(),
            truncated = prompt.truncated,
            outcome = "grounded",
            "question answered"
        );

        Ok(Answer {
            answer: text,
            cited_record_ids: prompt.cited_record_ids,
            retrieved: hits.iter().map(RetrievedEvidence::from).collect(),
            outcome: Outcome::Grounded,
        })
    }
}

/// Builder for constructing a [`QuakeRag`].
///
/// Nothing is required. Without a language model the engine can still
/// build, retrieve, and refuse. The embedder, index, and chunker default to
/// what the configuration selects:
/// [`embedder_from_model_id`], a [`FlatIndex`] with the configured metric,
/// and a [`FixedSizeChunker`].
#[derive(Default)]
pub struct QuakeRagBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn Embedder>>,
    index: Option<Arc<dyn VectorIndex>>,
    chunker: Option<Arc<dyn Chunker>>,
    model: Option<Arc<dyn LanguageModel>>,
    settings: Option<GenerationSettings>,
}

impl QuakeRagBuilder {
    /// Set the configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the embedder.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Override the vector index.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Override the chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the language model.
    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Override the generation settings (temperature `0.0` by default).
    pub fn generation_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Build the [`QuakeRag`], validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the configuration is invalid or the
    /// embedding model is unknown.
    pub fn build(self) -> Result<QuakeRag> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => embedder_from_model_id(&config.embedding_model)?,
        };
        let index: Arc<dyn VectorIndex> = match self.index {
            Some(index) => index,
            None => Arc::new(FlatIndex::new(config.distance_metric)),
        };
        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(FixedSizeChunker::from_config(&config)?),
        };

        let retriever =
            Retriever::new(embedder.clone(), index.clone()).with_default_k(config.top_k)?;
        let assembler = GroundingAssembler::from_config(&config)?;

        Ok(QuakeRag {
            config,
            embedder,
            index,
            chunker,
            model: self.model,
            retriever,
            assembler,
            settings: self.settings.unwrap_or_default(),
            indexed_ids: Mutex::new(HashSet::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLanguageModel;

    #[tokio::test]
    async fn retrieval_only_engine_refuses_but_cannot_answer() {
        let engine = QuakeRag::builder().build().unwrap();
        engine.build(&[]).await.unwrap();
        assert!(engine.ask("Radicofani").await.unwrap().is_refusal());

        let record = EventRecord::try_from(crate::record::RawEvent {
            event_id: "1".into(),
            time: "2025-01-01T00:00:00".into(),
            latitude: "42.0".into(),
            longitude: "11.0".into(),
            depth_km: "5".into(),
            magnitude: "1.0".into(),
            location: "Radicofani".into(),
            ..Default::default()
        })
        .unwrap();
        engine.build(&[record]).await.unwrap();
        assert_eq!(engine.retrieve("Radicofani", 1).await.unwrap().len(), 1);
        assert!(matches!(engine.ask("Radicofani").await, Err(RagError::Config(_))));
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let config = RagConfig { chunk_overlap: 400, ..RagConfig::default() };
        let result = QuakeRag::builder()
            .config(config)
            .language_model(Arc::new(MockLanguageModel::default()))
            .build();
        assert!(matches!(result, Err(RagError::Config(_))));
    }

    #[tokio::test]
    async fn ask_before_build_is_an_error() {
        let engine = QuakeRag::builder()
            .language_model(Arc::new(MockLanguageModel::default()))
            .build()
            .unwrap();
        assert!(matches!(engine.ask("Radicofani").await, Err(RagError::IndexNotBuilt)));
        assert!(matches!(engine.add_records(&[]).await, Err(RagError::IndexNotBuilt)));
    }

    #[tokio::test]
    async fn blank_question_before_build_is_an_error() {
        let model = Arc::new(MockLanguageModel::default());
        let engine = QuakeRag::builder().language_model(model.clone()).build().unwrap();
        assert!(matches!(engine.ask("   ").await, Err(RagError::IndexNotBuilt)));
        assert!(matches!(engine.ask("\u{200b}\n").await, Err(RagError::IndexNotBuilt)));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn single_character_chunks_are_numbered_without_gaps() {
        let config = RagConfig::builder().chunk_size(1).chunk_overlap(0).build().unwrap();
        let engine = QuakeRag::builder().config(config).build().unwrap();
        let record = EventRecord::try_from(crate::record::RawEvent {
            event_id: "7".into(),
            time: "2025-01-01T00:00:00".into(),
            latitude: "42.0".into(),
            longitude: "11.0".into(),
            depth_km: "5".into(),
            magnitude: "1.0".into(),
            location: "Visso".into(),
            ..Default::default()
        })
        .unwrap();
        let report = engine.build(&[record]).await.unwrap();

        let total = engine.index().len().await;
        assert_eq!(total, report.chunks);
        let hits = engine.retrieve("Visso", total).await.unwrap();
        assert_eq!(hits.len(), total);

        let mut sequences: Vec<usize> = hits.iter().map(|h| h.chunk.sequence).collect();
        sequences.sort_unstable();
        assert_eq!(sequences, (0..total).collect::<Vec<_>>());
        for hit in &hits {
            assert!(!hit.chunk.text.trim().is_empty());
            assert_eq!(hit.chunk.id, format!("7_{}", hit.chunk.sequence));
        }
    }

    #[tokio::test]
    async fn zero_k_is_rejected() {
        let engine = QuakeRag::builder()
            .language_model(Arc::new(MockLanguageModel::default()))
            .build()
            .unwrap();
        engine.build(&[]).await.unwrap();
        assert!(matches!(engine.ask_with_k("Radicofani", 0).await, Err(RagError::Config(_))));
    }
}
