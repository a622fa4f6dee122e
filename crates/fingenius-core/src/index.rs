//! In-memory vector index with brute-force cosine search.
//!
//! A [`VectorIndex`] is an append-only list of (chunk, vector) entries tagged
//! with the embedding model and dimensionality that produced them.
//!
//! # Merge semantics
//!
//! [`VectorIndex::merge_from`] appends every entry of the other index to the
//! receiver. Entries are not de-duplicated by content: merging an index
//! built from the same document twice doubles that document's entries.
//! Only entry ids must be unique, and both sides must share model and
//! dimensionality.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IndexError;
use crate::models::{Chunk, IndexEntry, ScoredChunk};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    model: String,
    dims: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index for vectors from `model` with `dims` dimensions.
    pub fn new(model: impl Into<String>, dims: usize) -> Self {
        Self {
            model: model.into(),
            dims,
            entries: Vec::new(),
        }
    }

    /// Build an index from chunks and their vectors, pairwise in order.
    pub fn from_embeddings(
        model: impl Into<String>,
        dims: usize,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::CountMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        let mut index = Self::new(model, dims);
        index.entries.reserve(chunks.len());
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            index.insert(chunk, vector)?;
        }
        Ok(index)
    }

    /// Append one entry under a fresh id. Returns the id.
    pub fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<String, IndexError> {
        self.check_dims(&vector)?;
        let id = Uuid::new_v4().to_string();
        self.entries.push(IndexEntry {
            id: id.clone(),
            chunk,
            vector,
        });
        Ok(id)
    }

    /// Append all of `other`'s entries after this index's own.
    ///
    /// Fails without modifying `self` when model, dimensionality or ids
    /// conflict.
    pub fn merge_from(&mut self, other: VectorIndex) -> Result<(), IndexError> {
        if other.model != self.model {
            return Err(IndexError::ModelMismatch {
                left: self.model.clone(),
                right: other.model,
            });
        }
        if other.dims != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                found: other.dims,
            });
        }

        let ids: HashSet<&str> = self.entries.iter().map(|e| e.id.as_str()).collect();
        if let Some(dup) = other.entries.iter().find(|e| ids.contains(e.id.as_str())) {
            return Err(IndexError::DuplicateId(dup.id.clone()));
        }

        self.entries.extend(other.entries);
        Ok(())
    }

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// Ties keep insertion order, so identical indexes give identical
    /// results for the same probe.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        self.check_dims(query)?;

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|e| ScoredChunk {
                id: e.id.clone(),
                chunk: e.chunk.clone(),
                score: cosine_similarity(query, &e.vector),
            })
            .collect();

        // NaN scores (from a NaN vector) rank last.
        let rank = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
        scored.sort_by(|a, b| rank(b.score).total_cmp(&rank(a.score)));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of entries per source identifier, sorted by source.
    pub fn source_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for e in &self.entries {
            *counts.entry(e.chunk.source.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn check_dims(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                found: vector.len(),
            });
        }
        Ok(())
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, and zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
