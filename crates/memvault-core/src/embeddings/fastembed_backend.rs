//! Local semantic embeddings via fastembed (ONNX inference)
//!
//! Grounded in `vestige-core::embeddings::local`: a lazily-initialized
//! global model guarded by a mutex, with Matryoshka-style truncation to
//! the crate's fixed `EMBEDDING_DIM` and L2 renormalization.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Mutex, OnceLock};

use super::{normalize, Embedder, EmbeddingError};
use crate::memory::EMBEDDING_DIM;

static MODEL: OnceLock<Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

fn cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("MEMVAULT_EMBEDDING_CACHE_PATH") {
        return std::path::PathBuf::from(path);
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "memvault", "core") {
        return proj_dirs.cache_dir().join("fastembed");
    }
    std::path::PathBuf::from(".fastembed_cache")
}

fn get_model() -> Result<std::sync::MutexGuard<'static, TextEmbedding>, EmbeddingError> {
    let result = MODEL.get_or_init(|| {
        let dir = cache_dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("failed to create embedding cache dir {:?}: {}", dir, e);
        }
        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(true)
            .with_cache_dir(dir);
        TextEmbedding::try_new(options)
            .map(Mutex::new)
            .map_err(|e| format!("failed to initialize embedding model: {e}"))
    });

    match result {
        Ok(model) => model
            .lock()
            .map_err(|e| EmbeddingError::ModelInit(format!("lock poisoned: {e}"))),
        Err(e) => Err(EmbeddingError::ModelInit(e.clone())),
    }
}

/// Truncate to `EMBEDDING_DIM` and L2-renormalize.
fn fit_dimension(mut vector: Vec<f32>) -> Vec<f32> {
    if vector.len() > EMBEDDING_DIM {
        vector.truncate(EMBEDDING_DIM);
    } else {
        vector.resize(EMBEDDING_DIM, 0.0);
    }
    normalize(&mut vector);
    vector
}

/// fastembed-backed `Embedder`.
pub struct FastEmbedder;

impl Default for FastEmbedder {
    fn default() -> Self {
        Self
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if texts.iter().any(|t| t.is_empty()) {
            return Err(EmbeddingError::InvalidInput("text must not be empty".into()));
        }

        let mut model = get_model()?;
        let borrowed: Vec<&str> = texts.iter().map(String::as_str).collect();
        let embeddings = model
            .embed(borrowed, None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

        Ok(embeddings.into_iter().map(fit_dimension).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_dimension_pads_short_vectors() {
        let v = fit_dimension(vec![1.0, 0.0]);
        assert_eq!(v.len(), EMBEDDING_DIM);
    }

    #[test]
    fn fit_dimension_truncates_long_vectors() {
        let v = fit_dimension(vec![1.0; EMBEDDING_DIM * 2]);
        assert_eq!(v.len(), EMBEDDING_DIM);
    }
}
