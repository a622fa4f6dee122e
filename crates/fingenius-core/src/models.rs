//! Data models flowing through the load → split → embed → index pipeline.

use serde::{Deserialize, Serialize};

/// Raw text of one loaded source, as produced by a loader strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// URL or file path the text was loaded from. Used for citations.
    pub source: String,
    /// Content type the loader observed (e.g. `application/pdf`).
    pub content_type: String,
    pub text: String,
}

impl Document {
    pub fn new(
        source: impl Into<String>,
        content_type: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            content_type: content_type.into(),
            text: text.into(),
        }
    }
}

/// A bounded fragment of a [`Document`]'s text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source identifier of the parent document.
    pub source: String,
    /// Position of this chunk within its document, starting at 0.
    pub chunk_index: u32,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// One stored (chunk, vector) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A retrieval hit: the chunk plus its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub id: String,
    pub chunk: Chunk,
    pub score: f32,
}
