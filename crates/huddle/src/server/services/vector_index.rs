//! Request-scoped, in-memory vector index
//!
//! Holds the chunks of one transcript alongside their embeddings and answers
//! nearest-neighbour queries by exhaustive cosine similarity. Transcripts are
//! small enough that a flat scan beats building any graph structure.

use std::cmp::Ordering;

use serde::Serialize;
use thiserror::Error;

use crate::server::services::chunker::Chunk;
use crate::server::services::similarity::cosine_similarity;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
  #[error("cannot build a vector index from zero chunks")]
  Empty,

  #[error("got {vectors} embeddings for {chunks} chunks")]
  LengthMismatch { chunks: usize, vectors: usize },

  #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },
}

/// A chunk paired with its similarity to a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
  pub chunk: Chunk,
  /// Cosine similarity, higher is closer
  pub score: f32,
}

struct Entry {
  chunk: Chunk,
  vector: Vec<f32>,
}

pub struct VectorIndex {
  entries: Vec<Entry>,
  dimension: usize,
}

impl VectorIndex {
  /// Build an index from chunks and their embeddings, paired by position.
  pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
    if chunks.is_empty() {
      return Err(IndexError::Empty);
    }
    if chunks.len() != vectors.len() {
      return Err(IndexError::LengthMismatch { chunks: chunks.len(), vectors: vectors.len() });
    }

    let dimension = vectors[0].len();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
      return Err(IndexError::DimensionMismatch { expected: dimension, actual: bad.len() });
    }

    let entries =
      chunks.into_iter().zip(vectors).map(|(chunk, vector)| Entry { chunk, vector }).collect();

    Ok(Self { entries, dimension })
  }

  /// Return up to `k` chunks ordered by descending similarity to `query`.
  ///
  /// Ties keep transcript order.
  pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
    if query.len() != self.dimension {
      return Err(IndexError::DimensionMismatch { expected: self.dimension, actual: query.len() });
    }

    let mut scored: Vec<ScoredChunk> = self
      .entries
      .iter()
      .map(|entry| ScoredChunk {
        chunk: entry.chunk.clone(),
        score: cosine_similarity(query, &entry.vector),
      })
      .collect();

    scored.sort_by(|a, b| {
      b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.chunk.index.cmp(&b.chunk.index))
    });
    scored.truncate(k);

    Ok(scored)
  }
}
