//! HybridStore (C6)
//!
//! Fronts `LocalStore` for every read and synchronous write; owns a
//! `SyncEngine` for cloud replication. Mirrors the teacher's `Storage`
//! pattern of interior-mutability-via-`Mutex` fields on a struct whose
//! methods take `&self`, so callers hold `Arc<HybridStore>` rather than
//! `Arc<Mutex<HybridStore>>`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::local::{LocalStore, TagMatch, TimeRange};
use super::{CloudStore, DeleteFilter, DeleteOutcome, ScoredMemory, SearchFilters, StoreOutcome};
use crate::embeddings::Embedder;
use crate::error::{MemvaultError, Result};
use crate::memory::{Memory, MetadataMap};
use crate::sync::{OpKind, SyncConfig, SyncEngine, SyncOperation};

/// Raised when the staging buffer (used while sync is paused) would
/// exceed its safety cap (§4.5). The caller must resume sync before
/// continuing to mutate the store.
#[derive(Debug, Clone, thiserror::Error)]
#[error("sync staging buffer exceeded its safety cap of {capacity} ops; resume_sync before continuing")]
pub struct PauseBacklogFullError {
    pub capacity: usize,
}

/// RAII guard returned by `pause_sync()`. Calls `resume_sync()` on drop
/// so sync resumes on every exit path, including panics — the same RAII
/// preference the teacher applies to its `Mutex` guards.
pub struct SyncPauseGuard {
    engine: Arc<SyncEngine>,
}

impl Drop for SyncPauseGuard {
    fn drop(&mut self) {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            engine.resume().await;
        });
    }
}

pub struct HybridStore {
    local: Arc<LocalStore>,
    cloud: Arc<CloudStore>,
    engine: Arc<SyncEngine>,
}

fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl HybridStore {
    pub fn new(
        local: Arc<LocalStore>,
        cloud: Arc<CloudStore>,
        sync_config: SyncConfig,
        dead_letter_path: PathBuf,
    ) -> Arc<Self> {
        let engine = SyncEngine::new(Arc::clone(&local), Arc::clone(&cloud), sync_config, dead_letter_path);
        engine.spawn();
        Arc::new(Self { local, cloud, engine })
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn cloud(&self) -> &CloudStore {
        &self.cloud
    }

    /// Clone of the internal `LocalStore` handle, for components (e.g. the
    /// consolidation engine's `GraphStore`) that need their own `Arc`.
    pub fn local_handle(&self) -> Arc<LocalStore> {
        Arc::clone(&self.local)
    }

    /// Reload any dead-lettered ops from a previous run (called once at
    /// startup alongside `startup_sync`).
    pub async fn reload_dead_letters(&self) -> std::io::Result<usize> {
        self.engine.reload_dead_letters().await
    }

    pub async fn startup_sync(&self) -> Result<usize> {
        Ok(self.engine.startup_sync().await.map_err(sync_err_to_memvault)?)
    }

    /// Stores locally unconditionally; the pre-sync size validator only
    /// decides whether the write is also queued for cloud replication. An
    /// oversize record is still durable locally, just never synced (§4.3,
    /// §8 boundary behavior "metadata at 9.5 KB encoded").
    pub async fn store(&self, memory: Memory) -> Result<StoreOutcome> {
        let outcome = self.local.store(memory.clone()).map_err(MemvaultError::from)?;
        if outcome.created {
            match self.cloud.validate_size(&memory) {
                Ok(()) => {
                    let op = SyncOperation::new(OpKind::Create, outcome.content_hash.clone(), Some(memory), now_secs());
                    self.enqueue(op).await?;
                }
                Err(e) => {
                    tracing::warn!(
                        hash = %outcome.content_hash,
                        error = %e,
                        "memory exceeds cloud size limits; stored locally only, not queued for sync"
                    );
                }
            }
        }
        Ok(outcome)
    }

    pub async fn get(&self, content_hash: &str) -> Result<Option<Memory>> {
        Ok(self.local.get(content_hash).map_err(MemvaultError::from)?)
    }

    pub async fn update_metadata(&self, content_hash: &str, patch: MetadataMap) -> Result<bool> {
        let updated = self
            .local
            .update_metadata(content_hash, patch)
            .map_err(MemvaultError::from)?;
        if updated {
            if let Some(memory) = self.local.get(content_hash).map_err(MemvaultError::from)? {
                let op = SyncOperation::new(OpKind::Update, content_hash.to_string(), Some(memory), now_secs());
                self.enqueue(op).await?;
            }
        }
        Ok(updated)
    }

    pub async fn update_memories_batch(&self, updates: &[(String, MetadataMap)]) -> Result<usize> {
        let count = self
            .local
            .update_memories_batch(updates)
            .map_err(MemvaultError::from)?;
        for (hash, _) in updates {
            if let Some(memory) = self.local.get(hash).map_err(MemvaultError::from)? {
                let op = SyncOperation::new(OpKind::Update, hash.clone(), Some(memory), now_secs());
                self.enqueue(op).await?;
            }
        }
        Ok(count)
    }

    /// Delete locally and enqueue a cloud delete. For ordinary deletes
    /// this is fire-and-forget like every other mutation; see
    /// `delete_synced` for the device-convergence-safe variant (§4.7).
    pub async fn delete(&self, content_hash: &str) -> Result<bool> {
        let deleted = self.local.delete(content_hash).map_err(MemvaultError::from)?;
        if deleted {
            let op = SyncOperation::new(OpKind::Delete, content_hash.to_string(), None, now_secs());
            self.enqueue(op).await?;
        }
        Ok(deleted)
    }

    /// Delete cloud-first, then local, so other devices' drift scanners
    /// observe the cloud deletion and converge rather than resurrecting
    /// the record (§4.7). Use for any maintenance tool doing bulk deletes.
    pub async fn delete_synced(&self, content_hash: &str) -> Result<bool> {
        self.cloud
            .delete_one(content_hash)
            .await
            .map_err(MemvaultError::from)?;
        Ok(self.local.delete(content_hash).map_err(MemvaultError::from)?)
    }

    /// Filter-composed bulk delete (§6.1): runs the AND-composed filter
    /// locally, then enqueues a cloud DELETE for every hash actually
    /// removed. `dry_run` never touches local or cloud state.
    pub async fn delete_filtered(&self, filter: DeleteFilter) -> Result<DeleteOutcome> {
        let dry_run = filter.dry_run;
        let outcome = self.local.delete_filtered(&filter).map_err(MemvaultError::from)?;
        if !dry_run {
            for hash in &outcome.hashes {
                let op = SyncOperation::new(OpKind::Delete, hash.clone(), None, now_secs());
                self.enqueue(op).await?;
            }
        }
        Ok(outcome)
    }

    pub fn search_by_tags(
        &self,
        tags: &[String],
        match_mode: TagMatch,
        time_range: Option<TimeRange>,
    ) -> Result<Vec<Memory>> {
        Ok(self
            .local
            .search_by_tags(tags, match_mode, time_range)
            .map_err(MemvaultError::from)?)
    }

    pub fn search_time_range(&self, range: TimeRange) -> Result<Vec<Memory>> {
        Ok(self.local.search_time_range(range).map_err(MemvaultError::from)?)
    }

    pub fn search_semantic(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredMemory>> {
        Ok(self
            .local
            .search_semantic(embedder, query, k, filters)
            .map_err(MemvaultError::from)?)
    }

    /// Pause cloud sync; local mutations still apply and land in a
    /// staging buffer until the returned guard is dropped (§4.5).
    pub async fn pause_sync(&self) -> SyncPauseGuard {
        self.engine.pause().await;
        SyncPauseGuard {
            engine: Arc::clone(&self.engine),
        }
    }

    pub async fn resume_sync(&self) {
        self.engine.resume().await;
    }

    pub async fn await_sync_idle(&self, timeout: Duration) -> bool {
        self.engine.await_idle(timeout).await
    }

    pub async fn shutdown(&self, drain_timeout: Duration) {
        self.engine.shutdown(drain_timeout).await;
    }

    async fn enqueue(&self, op: SyncOperation) -> Result<()> {
        self.engine.enqueue(op).await.map_err(sync_err_to_memvault)
    }
}

impl super::MemoryStore for HybridStore {
    type Error = MemvaultError;

    async fn store(&self, memory: Memory) -> Result<StoreOutcome> {
        HybridStore::store(self, memory).await
    }

    async fn get(&self, content_hash: &str) -> Result<Option<Memory>> {
        HybridStore::get(self, content_hash).await
    }

    async fn delete(&self, content_hash: &str) -> Result<bool> {
        HybridStore::delete(self, content_hash).await
    }

    async fn update_metadata(&self, content_hash: &str, patch: MetadataMap) -> Result<bool> {
        HybridStore::update_metadata(self, content_hash, patch).await
    }
}

fn sync_err_to_memvault(err: crate::sync::SyncError) -> MemvaultError {
    match err {
        crate::sync::SyncError::Cloud(e) => MemvaultError::from(e),
        crate::sync::SyncError::BacklogFull(capacity) => {
            MemvaultError::from(PauseBacklogFullError { capacity })
        }
        crate::sync::SyncError::Invalid(msg) => MemvaultError::Validation(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::DeterministicEmbedder;
    use crate::storage::{CloudConfig, CloudStore};

    fn hybrid_store() -> Arc<HybridStore> {
        let dir = tempfile::tempdir().unwrap();
        let local = Arc::new(LocalStore::open(Some(dir.path().join("t.db")), 15_000, 64_000).unwrap());
        std::mem::forget(dir);
        let cloud = Arc::new(CloudStore::new(CloudConfig::new("https://example.invalid", "token")));
        HybridStore::new(local, cloud, SyncConfig::default(), std::env::temp_dir().join("memvault_test_dlq.jsonl"))
    }

    #[tokio::test]
    async fn store_applies_locally_even_if_cloud_is_unreachable() {
        let store = hybrid_store();
        let embedder = DeterministicEmbedder::default();
        let embedding = embedder.embed_one("hello hybrid").unwrap();
        let memory = Memory::new("hello hybrid", vec![], None, MetadataMap::new(), embedding, 0).unwrap();

        let outcome = store.store(memory).await.unwrap();
        assert!(outcome.created);
        assert!(store.get(&outcome.content_hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn pause_guard_resumes_on_drop() {
        let store = hybrid_store();
        {
            let _guard = store.pause_sync().await;
            assert!(store.engine.is_paused().await);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!store.engine.is_paused().await);
    }

    #[tokio::test]
    async fn delete_filtered_removes_only_matching_tags() {
        let store = hybrid_store();
        let embedder = DeterministicEmbedder::default();

        let temp_embedding = embedder.embed_one("temp hybrid note").unwrap();
        let temp_memory =
            Memory::new("temp hybrid note", vec!["temporary".to_string()], None, MetadataMap::new(), temp_embedding, 0)
                .unwrap();
        let temp_outcome = store.store(temp_memory).await.unwrap();

        let keep_embedding = embedder.embed_one("keep hybrid note").unwrap();
        let keep_memory =
            Memory::new("keep hybrid note", vec!["permanent".to_string()], None, MetadataMap::new(), keep_embedding, 0)
                .unwrap();
        let keep_outcome = store.store(keep_memory).await.unwrap();

        let outcome = store
            .delete_filtered(crate::storage::DeleteFilter {
                tags: Some(vec!["temporary".to_string()]),
                tag_match: Some(TagMatch::Or),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.deleted_count, 1);
        assert!(store.get(&temp_outcome.content_hash).await.unwrap().is_none());
        assert!(store.get(&keep_outcome.content_hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_filtered_refuses_empty_filter() {
        let store = hybrid_store();
        let err = store.delete_filtered(crate::storage::DeleteFilter::default()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn mutation_during_pause_is_not_dropped() {
        let store = hybrid_store();
        let embedder = DeterministicEmbedder::default();
        let guard = store.pause_sync().await;

        let embedding = embedder.embed_one("paused write").unwrap();
        let memory = Memory::new("paused write", vec![], None, MetadataMap::new(), embedding, 0).unwrap();
        let outcome = store.store(memory).await.unwrap();
        assert!(outcome.created);
        assert!(store.get(&outcome.content_hash).await.unwrap().is_some());

        drop(guard);
    }
}
