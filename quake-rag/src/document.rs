//! Data types for canonical documents, chunks, and search hits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structured attributes of one record, keyed by field name.
///
/// A `BTreeMap` keeps rendering order stable across runs.
pub type Metadata = BTreeMap<String, String>;

/// The normalized textual rendering of one [`EventRecord`](crate::EventRecord).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Identifier of the record this document renders.
    pub record_id: String,
    /// Canonical, normalized text.
    pub text: String,
    /// Every structured attribute of the record.
    pub metadata: Metadata,
}

/// A bounded segment of a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, `{record_id}_{sequence}`.
    pub id: String,
    /// The segment text.
    pub text: String,
    /// Identifier of the owning record.
    pub record_id: String,
    /// Exactly the owning document's metadata.
    pub metadata: Metadata,
    /// Position among the chunks of the same document, starting at 0.
    pub sequence: usize,
}

/// A retrieved [`Chunk`] with its distance and similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Distance to the query under the index metric (lower is closer).
    pub distance: f32,
    /// Similarity score (higher is more relevant).
    pub score: f32,
}

/// The caller-facing view of one retrieved hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedEvidence {
    /// Identifier of the record the hit came from.
    pub record_id: String,
    /// Similarity score.
    pub score: f32,
    /// The first characters of the chunk text.
    pub snippet: String,
}

/// Characters kept in a [`RetrievedEvidence::snippet`].
pub const SNIPPET_CHARS: usize = 100;

impl From<&SearchHit> for RetrievedEvidence {
    fn from(hit: &SearchHit) -> Self {
        Self {
            record_id: hit.chunk.record_id.clone(),
            score: hit.score,
            snippet: snippet(&hit.chunk.text, SNIPPET_CHARS),
        }
    }
}

/// Truncate `text` to at most `max_chars` characters, marking the cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
