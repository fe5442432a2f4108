//! Memory module — the canonical record type (C1)
//!
//! A `Memory` is the unit of storage: content, tags, metadata, and a
//! fixed-dimension embedding, uniquely identified by a content hash.

mod metadata;

pub use metadata::{keys, MetadataMap, Value};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Default embedding dimension (§3.1).
pub const EMBEDDING_DIM: usize = 384;

/// Cloud-bound content length limit (§3.1, §4.3).
pub const MAX_CONTENT_CHARS: usize = 5_000;

/// Relationship types for graph edges (§3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    Related,
    Contradicts,
    Causes,
    Fixes,
    Supports,
    Follows,
}

impl RelationshipType {
    /// `related` and `contradicts` are symmetric; everything else is
    /// asymmetric (§3.2).
    pub fn is_symmetric(&self) -> bool {
        matches!(self, RelationshipType::Related | RelationshipType::Contradicts)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Related => "related",
            RelationshipType::Contradicts => "contradicts",
            RelationshipType::Causes => "causes",
            RelationshipType::Fixes => "fixes",
            RelationshipType::Supports => "supports",
            RelationshipType::Follows => "follows",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "related" => Some(RelationshipType::Related),
            "contradicts" => Some(RelationshipType::Contradicts),
            "causes" => Some(RelationshipType::Causes),
            "fixes" => Some(RelationshipType::Fixes),
            "supports" => Some(RelationshipType::Supports),
            "follows" => Some(RelationshipType::Follows),
            _ => None,
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validation/construction errors for `Memory`.
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum MemoryError {
    #[error("content must not be empty")]
    EmptyContent,
    #[error("content exceeds {MAX_CONTENT_CHARS} characters: got {0}")]
    ContentTooLong(usize),
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    EmbeddingDimension { expected: usize, got: usize },
    #[error("embedding is a zero vector")]
    ZeroVectorEmbedding,
    #[error("tag must not be empty or whitespace-only")]
    EmptyTag,
}

/// The unit of storage (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub content: String,
    pub content_hash: String,
    pub tags: BTreeSet<String>,
    pub memory_type: String,
    pub metadata: MetadataMap,
    pub embedding: Vec<f32>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Stable digest of normalized content (§3.1). Normalization here is
/// trim-only: the spec defines `content_hash` as a pure function of
/// content, and trimming avoids spurious duplicates from incidental
/// leading/trailing whitespace without altering meaning.
pub fn content_hash(content: &str) -> String {
    let normalized = content.trim();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// First 8 hex chars of a content hash (§6.2 user-facing short identifier).
pub fn short_id(content_hash: &str) -> &str {
    &content_hash[..content_hash.len().min(8)]
}

impl Memory {
    /// Construct a new `Memory`, validating all invariants from §3.1 and
    /// computing `content_hash`. `created_at` and `updated_at` are equal
    /// on insert.
    pub fn new(
        content: impl Into<String>,
        tags: impl IntoIterator<Item = String>,
        memory_type: Option<String>,
        metadata: MetadataMap,
        embedding: Vec<f32>,
        now: i64,
    ) -> Result<Self, MemoryError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(MemoryError::EmptyContent);
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(MemoryError::ContentTooLong(content.chars().count()));
        }
        if embedding.len() != EMBEDDING_DIM {
            return Err(MemoryError::EmbeddingDimension {
                expected: EMBEDDING_DIM,
                got: embedding.len(),
            });
        }
        if embedding.iter().all(|x| *x == 0.0) {
            return Err(MemoryError::ZeroVectorEmbedding);
        }

        let mut tag_set = BTreeSet::new();
        for tag in tags {
            let trimmed = tag.trim().to_string();
            if trimmed.is_empty() {
                return Err(MemoryError::EmptyTag);
            }
            tag_set.insert(trimmed);
        }

        let hash = content_hash(&content);

        Ok(Self {
            content,
            content_hash: hash,
            tags: tag_set,
            memory_type: memory_type.unwrap_or_else(|| "note".to_string()),
            metadata,
            embedding,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn short_id(&self) -> &str {
        short_id(&self.content_hash)
    }

    /// Whether the embedding is a flagged-invalid zero vector (§3.1,
    /// also relevant to the LocalStore repair maintenance path).
    pub fn has_zero_embedding(&self) -> bool {
        self.embedding.iter().all(|x| *x == 0.0)
    }
}
