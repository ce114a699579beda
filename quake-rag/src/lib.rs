//! Grounded question answering over seismic event catalogs.
//!
//! This crate provides:
//! - Catalog loading with per-row validation ([`load_dir`], [`LoadReport`])
//! - One shared text normalizer for documents and queries ([`normalize`])
//! - Fixed-size overlapping chunking ([`Chunker`], [`FixedSizeChunker`])
//! - Pluggable embedders ([`Embedder`], [`HashingEmbedder`], a local
//!   sentence-transformer behind the `fastembed` feature, and an OpenAI
//!   client behind the `openai` feature)
//! - An exact in-memory vector index ([`VectorIndex`], [`FlatIndex`])
//! - Retrieval and refusal-aware prompt assembly ([`Retriever`],
//!   [`GroundingAssembler`])
//! - The engine tying it together ([`QuakeRag`])
//!
//! When retrieval finds no usable evidence the engine answers with the fixed
//! [`REFUSAL`] and never contacts the language model.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod flat;
pub mod grounding;
pub mod hashing;
pub mod index;
pub mod llm;
pub mod loader;
pub mod mock;
pub mod normalize;
#[cfg(feature = "fastembed")]
pub mod onnx;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod record;
pub mod retriever;

pub use chunking::{Chunker, FixedSizeChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, Metadata, RetrievedEvidence, SearchHit};
pub use embedding::{Embedder, embedder_from_model_id};
pub use error::{RagError, Result};
pub use flat::FlatIndex;
pub use grounding::{GroundedPrompt, Grounding, GroundingAssembler, REFUSAL};
pub use hashing::HashingEmbedder;
pub use index::{DistanceMetric, IndexEntry, VectorIndex};
pub use llm::{GenerationSettings, LanguageModel};
pub use loader::{LoadReport, Rejection, load_dir, load_file};
pub use mock::MockLanguageModel;
pub use normalize::{normalize, render_document};
#[cfg(feature = "fastembed")]
pub use onnx::FastEmbedder;
#[cfg(feature = "openai")]
pub use openai::{OpenAIChatModel, OpenAIEmbedder};
pub use pipeline::{Answer, IndexReport, Outcome, QuakeRag, QuakeRagBuilder};
pub use record::{EventRecord, Measurement, RawEvent, RecordRejection};
pub use retriever::Retriever;
