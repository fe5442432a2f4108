//! Deterministic test-double embedder
//!
//! A hash-based pseudo-embedding so unit and integration tests never
//! require ONNX model downloads or network access. Grounded in how the
//! teacher's `EmbeddingService` is itself exercised without network
//! access in its own test suite.

use super::{normalize, Embedder, EmbeddingError};
use crate::memory::EMBEDDING_DIM;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Produces a stable unit-norm vector from the hash of the input text.
/// Similar inputs do *not* produce similar vectors (this is not a real
/// embedding model) — it exists purely so storage/search plumbing can be
/// exercised deterministically.
pub struct DeterministicEmbedder {
    dim: usize,
}

impl Default for DeterministicEmbedder {
    fn default() -> Self {
        Self { dim: EMBEDDING_DIM }
    }
}

impl DeterministicEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dim];
        for (i, word) in text.split_whitespace().enumerate() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            (i as u64).hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let sign = if h & 1 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }
        if vector.iter().all(|x| *x == 0.0) {
            vector[0] = 1.0;
        }
        normalize(&mut vector);
        vector
    }
}

impl Embedder for DeterministicEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.iter().any(|t| t.is_empty()) {
            return Err(EmbeddingError::InvalidInput("text must not be empty".into()));
        }
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
