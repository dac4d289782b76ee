/// Calculate cosine similarity between two embeddings
///
/// Mismatched lengths and zero-magnitude vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  if a.len() != b.len() {
    return 0.0;
  }

  let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
  let magnitude_a = magnitude(a);
  let magnitude_b = magnitude(b);

  if magnitude_a == 0.0 || magnitude_b == 0.0 {
    0.0
  } else {
    dot_product / (magnitude_a * magnitude_b)
  }
}

fn magnitude(v: &[f32]) -> f32 {
  v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
