//! Storage abstraction and its three concrete backends (C3, C4, C6)
//!
//! A single capability set — store, get, search, update, delete — modeled
//! as a trait rather than a class hierarchy (§9 design note). `HybridStore`
//! is a struct containing a `LocalStore` and a `SyncEngine` (which itself
//! owns a `CloudStore`), not a subclass of either.

mod cloud;
mod codec;
mod hybrid;
mod local;
mod migrations;
mod vector_index;

pub use cloud::{BatchOutcome, CloudConfig, CloudError, CloudRecord, CloudStore, DigestInfo, ListingPage};
pub use codec::{CodecError, MetadataCodec, CLOUD_METADATA_SOFT_LIMIT_BYTES};
pub use hybrid::{HybridStore, PauseBacklogFullError, SyncPauseGuard};
pub use local::{HealthPragmas, LocalStore, StorageError, TagMatch, TimeRange};

use crate::memory::Memory;

/// Result of a `store` call: `created = false` means identical content
/// already existed and the call was a no-op (§3.1, §8 property 1).
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOutcome {
    pub content_hash: String,
    pub created: bool,
}

/// A scored search hit.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub score: f32,
}

/// Filters shared by the tag/time/semantic search operations (§4.2).
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub tags: Option<Vec<String>>,
    pub tag_match: Option<TagMatch>,
    pub time_range: Option<TimeRange>,
    pub memory_type: Option<String>,
}

/// Filter composition for the bulk `delete` operation (§6.1). Filters are
/// ANDed together; at least one must be set or the call is refused,
/// since an empty filter set would otherwise mean "delete everything".
#[derive(Debug, Clone, Default)]
pub struct DeleteFilter {
    pub content_hash: Option<String>,
    pub tags: Option<Vec<String>>,
    pub tag_match: Option<TagMatch>,
    pub before: Option<i64>,
    pub after: Option<i64>,
    pub dry_run: bool,
}

impl DeleteFilter {
    pub fn is_empty(&self) -> bool {
        self.content_hash.is_none() && self.tags.is_none() && self.before.is_none() && self.after.is_none()
    }
}

/// Result of a filtered delete: the hashes actually deleted (or, under
/// `dry_run`, the hashes that would be).
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub deleted_count: usize,
    pub hashes: Vec<String>,
}

/// Core read/write capability set shared by all three backends.
///
/// Implemented with native `async fn` (no `dyn` dispatch needed: the
/// active backend is chosen once via `config::StorageBackend` and held as
/// a concrete type, per §9's "interface/trait, not class hierarchy" note).
pub trait MemoryStore {
    type Error;

    async fn store(&self, memory: Memory) -> Result<StoreOutcome, Self::Error>;
    async fn get(&self, content_hash: &str) -> Result<Option<Memory>, Self::Error>;
    async fn delete(&self, content_hash: &str) -> Result<bool, Self::Error>;
    async fn update_metadata(
        &self,
        content_hash: &str,
        patch: crate::memory::MetadataMap,
    ) -> Result<bool, Self::Error>;
}
