//! # memvault-core
//!
//! Storage and synchronization engine for a semantic memory service.
//!
//! - **Content-addressed storage**: every memory is keyed by a SHA-256
//!   hash of its (trimmed) content; re-storing identical content is a
//!   no-op.
//! - **Hybrid local/cloud sync**: a SQLite-backed local store fronts
//!   every read and write; a bounded, coalescing, backoff-driven queue
//!   replicates to a cloud backend without blocking the caller.
//! - **Semantic search**: local embeddings (fastembed) plus an optional
//!   HNSW index (USearch), with a brute-force cosine fallback when the
//!   `vector-search` feature is off.
//! - **Graph associations**: directed/undirected edges between memories,
//!   with BFS traversal, shortest-path, and subgraph queries.
//! - **Quality scoring**: pluggable per-memory quality with a
//!   quality-boosted re-ranking of semantic search hits and
//!   quality-gated retention tiers.
//! - **Consolidation**: a multi-horizon (daily/weekly/monthly/quarterly/
//!   yearly) pipeline that decays relevance, clusters related memories,
//!   discovers creative associations, compresses clusters into summaries,
//!   and archives what's gone stale.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use memvault_core::{Config, Memory, MetadataMap};
//! use memvault_core::embeddings::{DeterministicEmbedder, Embedder};
//! use memvault_core::storage::LocalStore;
//!
//! let config = Config::from_env();
//! let local = LocalStore::open(None, config.sqlite_busy_timeout_ms, config.sqlite_cache_size_kb)?;
//!
//! let embedder = DeterministicEmbedder::default();
//! let embedding = embedder.embed_one("first memory")?;
//! let memory = Memory::new("first memory", vec![], None, MetadataMap::new(), embedding, 0)?;
//! local.store(memory)?;
//! ```
//!
//! ## Feature flags
//!
//! - `embeddings` (default): local embedding generation with fastembed.
//!   Without it, only `DeterministicEmbedder` (the test double) is
//!   available.
//! - `vector-search` (default): HNSW search via USearch. Without it,
//!   semantic search falls back to a brute-force cosine scan.
//! - `bundled-sqlite` (default): statically links SQLite via
//!   `rusqlite`'s `bundled` feature, so the crate has no system SQLite
//!   dependency.

pub mod config;
pub mod consolidation;
pub mod embeddings;
pub mod error;
pub mod graph;
pub mod memory;
pub mod quality;
pub mod storage;
pub mod sync;

pub use config::{Config, StorageBackend};
pub use error::{MemvaultError, Result};
pub use memory::{content_hash, keys, short_id, Memory, MemoryError, MetadataMap, RelationshipType, Value, EMBEDDING_DIM, MAX_CONTENT_CHARS};

pub use embeddings::{cosine_similarity, normalize, Embedder, EmbeddingError};

pub use storage::{
    BatchOutcome, CloudConfig, CloudError, CloudStore, HybridStore, LocalStore, MemoryStore,
    PauseBacklogFullError, ScoredMemory, SearchFilters, StorageError, StoreOutcome,
    SyncPauseGuard, TagMatch, TimeRange,
};

pub use sync::{SyncConfig, SyncEngine, SyncError};

pub use graph::{ConnectedHop, Direction, Edge, GraphStore};

pub use quality::{
    quality_boosted_rerank, score_if_eligible, QualityError, QualityScorer, RetentionTier,
};

pub use consolidation::{
    ConsolidationEngine, ConsolidationError, ConsolidationPhase, ConsolidationReport, PhaseResult,
    TimeHorizon,
};

/// Crate version, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        Config, Embedder, GraphStore, HybridStore, Memory, MemoryError, MemoryStore, MetadataMap,
        QualityScorer, Result, ScoredMemory, SearchFilters, StoreOutcome,
    };

    pub use crate::consolidation::{ConsolidationEngine, TimeHorizon};
    pub use crate::embeddings::DeterministicEmbedder;
    pub use crate::quality::DeterministicQualityScorer;
}
