//! End-to-end consolidation: storage, graph, and quality wired together
//! through `ConsolidationEngine::run`.

use std::sync::Arc;

use memvault_core::consolidation::{ConsolidationEngine, ConsolidationPhase, TimeHorizon};
use memvault_core::embeddings::{DeterministicEmbedder, Embedder};
use memvault_core::quality::DeterministicQualityScorer;
use memvault_core::storage::{CloudConfig, CloudStore, LocalStore};
use memvault_core::sync::SyncConfig;
use memvault_core::{Config, HybridStore, Memory, MetadataMap};

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

fn one_hot(dim: usize, hot: usize) -> Vec<f32> {
    let mut v = vec![0.0_f32; dim];
    v[hot % dim] = 1.0;
    v
}

#[tokio::test]
async fn monthly_run_scores_clusters_and_archives_in_one_pass() {
    let store = hybrid_store("consolidation_pipeline");
    let embedder = DeterministicEmbedder::default();
    let dim = embedder.dimension();

    // Three near-identical memories (cluster), one isolated memory.
    let mut cluster_hashes = Vec::new();
    for i in 0..3 {
        let memory = Memory::new(
            format!("project note {i}"),
            vec!["project".to_string()],
            None,
            MetadataMap::new(),
            one_hot(dim, 0),
            0,
        )
        .unwrap();
        let outcome = store.store(memory).await.unwrap();
        cluster_hashes.push(outcome.content_hash);
    }

    let isolated = Memory::new(
        "an unrelated memory",
        vec![],
        None,
        MetadataMap::new(),
        one_hot(dim, 200),
        0,
    )
    .unwrap();
    let isolated_outcome = store.store(isolated).await.unwrap();

    let scorer = Arc::new(DeterministicQualityScorer::default());
    let config = Config::default();
    let engine = ConsolidationEngine::new(Arc::clone(&store), scorer, config);

    let report = engine.run(TimeHorizon::Monthly).await.unwrap();
    let phases: Vec<ConsolidationPhase> = report.phases.iter().map(|p| p.phase).collect();
    assert!(phases.contains(&ConsolidationPhase::Decay));
    assert!(phases.contains(&ConsolidationPhase::Clustering));

    for hash in &cluster_hashes {
        let memory = store.get(hash).await.unwrap().unwrap();
        assert!(memory.metadata.relevance_score().is_some(), "decay phase should stamp relevance");
    }

    let isolated_memory = store.get(&isolated_outcome.content_hash).await.unwrap().unwrap();
    assert!(isolated_memory.metadata.relevance_score().is_some());
}

#[tokio::test]
async fn daily_run_only_decays_recent_memories() {
    let store = hybrid_store("consolidation_daily");
    let embedder = DeterministicEmbedder::default();
    let embedding = embedder.embed_one("today's memory").unwrap();
    let memory = Memory::new("today's memory", vec![], None, MetadataMap::new(), embedding, 0).unwrap();
    let outcome = store.store(memory).await.unwrap();

    let scorer = Arc::new(DeterministicQualityScorer::default());
    let engine = ConsolidationEngine::new(Arc::clone(&store), scorer, Config::default());

    let report = engine.run(TimeHorizon::Daily).await.unwrap();
    assert_eq!(report.phases.len(), 1);
    assert_eq!(report.phases[0].phase, ConsolidationPhase::Decay);

    let updated = store.get(&outcome.content_hash).await.unwrap().unwrap();
    assert!(updated.metadata.relevance_score().unwrap() > 0.9);
}
