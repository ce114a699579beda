//! Error types for the `quake-rag` crate.
//!
//! Refusing to answer is not an error: it is a successful
//! [`Outcome::Refused`](crate::Outcome::Refused). Everything in here is a
//! failure the caller must be able to tell apart from a refusal.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading, indexing, retrieving, or answering.
#[derive(Debug, Error)]
pub enum RagError {
    /// A catalog file could not be turned into records at all.
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Loading finished but no record survived validation.
    #[error("No valid event records found in {files} file(s) ({rejected} row(s) rejected)")]
    NoValidRecords {
        /// Number of catalog files that were read.
        files: usize,
        /// Number of rows that were skipped.
        rejected: usize,
    },

    /// A configuration validation error. Never clamped, always fatal.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A search was attempted before the index was ever built.
    #[error("Vector index has not been built")]
    IndexNotBuilt,

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedder that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index.
    #[error("Vector index error ({backend}): {message}")]
    VectorIndex {
        /// The index implementation that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The language-model collaborator failed or timed out.
    #[error("Language model error ({provider}): {message}")]
    LanguageModel {
        /// The model backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A filesystem error while reading catalog files.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl RagError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// A convenience result type for quake-rag operations.
pub type Result<T> = std::result::Result<T, RagError>;
