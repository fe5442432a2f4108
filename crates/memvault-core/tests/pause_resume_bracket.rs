//! Pause/resume bracket: mutations made while sync is paused are neither
//! lost nor blocked, and the guard always resumes sync on drop.

use std::sync::Arc;
use std::time::Duration;

use memvault_core::embeddings::{DeterministicEmbedder, Embedder};
use memvault_core::storage::{CloudConfig, CloudStore, LocalStore};
use memvault_core::sync::SyncConfig;
use memvault_core::{HybridStore, Memory, MetadataMap};

fn hybrid_store(tag: &str) -> Arc<HybridStore> {
    let dir = tempfile::tempdir().unwrap();
    let local = Arc::new(LocalStore::open(Some(dir.path().join("db.sqlite")), 15_000, 64_000).unwrap());
    std::mem::forget(dir);
    let cloud = Arc::new(CloudStore::new(CloudConfig::new("https://example.invalid", "token")));
    HybridStore::new(
        local,
        cloud,
        SyncConfig::default(),
        std::env::temp_dir().join(format!("memvault_it_{tag}.jsonl")),
    )
}

fn memory(text: &str) -> Memory {
    let embedder = DeterministicEmbedder::default();
    let embedding = embedder.embed_one(text).unwrap();
    Memory::new(text, vec![], None, MetadataMap::new(), embedding, 0).unwrap()
}

#[tokio::test]
async fn writes_made_during_pause_survive_and_sync_resumes_after_drop() {
    let store = hybrid_store("pause_bracket");

    let before = store.store(memory("unpaused write")).await.unwrap();
    assert!(before.created);

    let guard = store.pause_sync().await;

    let during_a = store.store(memory("paused write one")).await.unwrap();
    let during_b = store.store(memory("paused write two")).await.unwrap();
    assert!(during_a.created && during_b.created);

    drop(guard);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(store.get(&before.content_hash).await.unwrap().is_some());
    assert!(store.get(&during_a.content_hash).await.unwrap().is_some());
    assert!(store.get(&during_b.content_hash).await.unwrap().is_some());
}

#[tokio::test]
async fn nested_pause_guard_does_not_block_local_reads_and_writes() {
    let store = hybrid_store("pause_reads");
    let _guard = store.pause_sync().await;

    let outcome = store.store(memory("read during pause")).await.unwrap();
    let fetched = store.get(&outcome.content_hash).await.unwrap().unwrap();
    assert_eq!(fetched.content, "read during pause");

    let mut patch = MetadataMap::new();
    patch.insert("note", "updated while paused");
    let updated = store.update_metadata(&outcome.content_hash, patch).await.unwrap();
    assert!(updated);
}
