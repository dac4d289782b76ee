//! Fixed-size, overlapping transcript chunking
//!
//! Offsets and lengths are counted in chars so multi-byte text is never cut
//! inside a character.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default chunk length in chars
pub const DEFAULT_CHUNK_SIZE: usize = 200;

/// Default overlap between consecutive chunks in chars
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkerError {
  #[error("chunk size must be greater than zero")]
  ZeroChunkSize,

  #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
  OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// A contiguous slice of the source transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
  /// Chunk text
  pub text: String,
  /// Position of the chunk within the transcript
  pub index: usize,
}

/// Validated chunking parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
  chunk_size: usize,
  overlap: usize,
}

impl ChunkerConfig {
  pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkerError> {
    if chunk_size == 0 {
      return Err(ChunkerError::ZeroChunkSize);
    }
    if overlap >= chunk_size {
      return Err(ChunkerError::OverlapTooLarge { chunk_size, overlap });
    }
    Ok(Self { chunk_size, overlap })
  }

  pub fn chunk_size(&self) -> usize {
    self.chunk_size
  }

  pub fn overlap(&self) -> usize {
    self.overlap
  }

  /// Distance in chars between the starts of two consecutive chunks
  pub fn step(&self) -> usize {
    self.chunk_size - self.overlap
  }
}

impl Default for ChunkerConfig {
  fn default() -> Self {
    Self { chunk_size: DEFAULT_CHUNK_SIZE, overlap: DEFAULT_CHUNK_OVERLAP }
  }
}

/// Split `text` into overlapping chunks.
///
/// Blank input yields no chunks; callers decide whether that is an error.
pub fn split(text: &str, config: &ChunkerConfig) -> Vec<Chunk> {
  if text.trim().is_empty() {
    return Vec::new();
  }

  // Byte offset of every char boundary, plus the end of the string
  let boundaries: Vec<usize> =
    text.char_indices().map(|(offset, _)| offset).chain(std::iter::once(text.len())).collect();
  let char_count = boundaries.len() - 1;

  let mut chunks = Vec::new();
  let mut start = 0;
  loop {
    let end = (start + config.chunk_size()).min(char_count);
    chunks.push(Chunk { text: text[boundaries[start]..boundaries[end]].to_string(), index: chunks.len() });
    if end == char_count {
      break;
    }
    start += config.step();
  }

  chunks
}
