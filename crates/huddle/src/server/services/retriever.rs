use crate::server::services::vector_index::{IndexError, ScoredChunk, VectorIndex};

/// Number of chunks retrieved per question unless configured otherwise
pub const DEFAULT_TOP_K: usize = 4;

/// Top-K retrieval over a single transcript's index
pub struct Retriever {
  index: VectorIndex,
  k: usize,
}

impl Retriever {
  pub fn new(index: VectorIndex, k: usize) -> Self {
    Self { index, k }
  }

  pub fn retrieve(&self, query_embedding: &[f32]) -> Result<Vec<ScoredChunk>, IndexError> {
    self.index.query(query_embedding, self.k)
  }
}
