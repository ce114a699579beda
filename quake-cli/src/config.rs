//! Launcher configuration: an optional TOML file, then environment, then flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quake_rag::{DistanceMetric, RagConfig};
use serde::Deserialize;

/// Default catalog directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Contents of a `quake.toml` file.
///
/// ```toml
/// data_dir = "data"
///
/// [rag]
/// chunk_size = 400
/// chunk_overlap = 40
/// top_k = 8
/// distance_metric = "l2"
///
/// [llm]
/// model = "llama-3.3-70b-versatile"
/// timeout_secs = 60
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub data_dir: Option<PathBuf>,
    pub rag: RagConfig,
    pub llm: LlmConfig,
}

/// Chat endpoint settings. API keys are only ever read from the environment.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Read and parse `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Flag values that override the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub top_k: Option<usize>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub embedding_model: Option<String>,
    pub distance_metric: Option<DistanceMetric>,
    pub relevance_floor: Option<f32>,
    pub model: Option<String>,
}

/// Fully resolved launcher settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub rag: RagConfig,
    pub llm: LlmConfig,
}

impl Settings {
    /// Merge the file (if any) with environment and flag overrides, then
    /// validate the engine configuration.
    pub fn resolve(file: Option<FileConfig>, overrides: Overrides) -> Result<Self> {
        let FileConfig { data_dir, rag, mut llm } = file.unwrap_or_default();

        let mut builder = RagConfig::builder()
            .chunk_size(overrides.chunk_size.unwrap_or(rag.chunk_size))
            .chunk_overlap(overrides.chunk_overlap.unwrap_or(rag.chunk_overlap))
            .top_k(overrides.top_k.unwrap_or(rag.top_k))
            .embedding_model(overrides.embedding_model.unwrap_or(rag.embedding_model))
            .distance_metric(overrides.distance_metric.unwrap_or(rag.distance_metric))
            .context_budget_chars(rag.context_budget_chars);
        if let Some(floor) = overrides.relevance_floor.or(rag.relevance_floor) {
            builder = builder.relevance_floor(floor);
        }
        let rag = builder.build()?;

        if let Ok(base_url) = std::env::var("QUAKE_LLM_BASE_URL") {
            llm.base_url = Some(base_url);
        }
        if let Ok(model) = std::env::var("QUAKE_LLM_MODEL") {
            llm.model = Some(model);
        }
        if let Some(model) = overrides.model {
            llm.model = Some(model);
        }

        let data_dir = overrides
            .data_dir
            .or(data_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Ok(Self { data_dir, rag, llm })
    }
}
