//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait the pipeline and retrieval
//! engine depend on, plus cosine similarity. Vectors must be dimensionally
//! consistent across the whole corpus; mixing models invalidates
//! similarity comparison, so retrieval skips documents whose stored
//! dimensionality disagrees with the query vector.
//!
//! The bundled [`HashingEmbedder`] is a deterministic, model-free
//! bag-of-words backend (feature hashing with a sign bit). It gives the
//! CLI and the tests real similarity behavior with no model download;
//! applications swap in an actual embedding model behind the same trait.

use sha2::{Digest, Sha256};

use crate::error::EmbeddingError;

/// Trait for embedding backends.
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier recorded in each per-document index.
    fn model_name(&self) -> &str;
    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed one text into a `dims()`-length vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors
/// of different lengths.
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

/// Deterministic hashed bag-of-words embedder.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing-bow"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vec = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes(digest[..8].try_into().expect("8-byte slice"))
                as usize
                % self.dims;
            // One digest bit decides the sign so unrelated tokens cancel
            // rather than pile up in the same direction.
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vec[bucket] += sign;
        }

        let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        Ok(vec)
    }
}

/// Lower-cased alphanumeric tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}
