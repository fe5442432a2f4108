//! Top-level error taxonomy
//!
//! Mirrors the layered error-enum pattern used throughout storage: a small
//! set of *kinds* (not one variant per failure site), each wrapping the
//! lower-level error it was produced from.

use crate::embeddings::EmbeddingError;
use crate::storage::{CloudError, CodecError, StorageError};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MemvaultError>;

/// Error kinds per the propagation policy: `Validation`/`NotFound`/`Fatal`
/// surface synchronously to callers; `Transient` never surfaces on the
/// write path (it becomes queue backlog or a dead-letter entry).
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MemvaultError {
    /// Malformed input: empty content, invalid hash, oversized content. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown content_hash.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient network/5xx/timeout failure. Retried with backoff by the sync engine.
    #[error("transient error: {0}")]
    Transient(String),

    /// Metadata or content exceeds cloud limits after encoding. Dead-lettered, not retried.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// LocalStore integrity failure (missing embedding, zero vector, index mismatch).
    #[error("storage corruption: {0}")]
    StorageCorruption(String),

    /// Sync queue saturated for longer than the enqueue blocking window.
    #[error("sync queue full")]
    QueueFull,

    /// Unable to initialize LocalStore (disk, permissions). The service should not start.
    #[error("fatal initialization error: {0}")]
    Fatal(String),

    /// Underlying LocalStore failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Underlying CloudStore failure.
    #[error(transparent)]
    Cloud(#[from] CloudError),

    /// Underlying MetadataCodec failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Underlying Embedder failure.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Sync staging buffer exceeded its safety cap while paused.
    #[error(transparent)]
    PauseBacklogFull(#[from] crate::storage::PauseBacklogFullError),
}

impl MemvaultError {
    /// True for kinds the sync worker should retry (vs. dead-letter immediately).
    pub fn is_retryable(&self) -> bool {
        matches!(self, MemvaultError::Transient(_))
            || matches!(self, MemvaultError::Cloud(CloudError::Transient(_)))
    }
}
