//! Consolidation pipeline (C9)
//!
//! Periodically refines the memory corpus: decay, cluster, associate,
//! compress, forget. Phase/report shape mirrors the teacher's
//! `DreamEngine`/`PhaseResult` in `consolidation/phases.rs`, re-termed
//! from sleep-cycle language to this pipeline's own vocabulary. The
//! sync-pause bracket reuses `SyncPauseGuard`, grounded in the teacher's
//! preference for RAII guards over manual release (see `storage/sqlite.rs`'s
//! `Mutex` guard usage).

mod clustering;

pub use clustering::{cluster_embeddings, Cluster};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::embeddings::cosine_similarity;
use crate::graph::{Edge, GraphStore};
use crate::memory::{keys, Memory, MetadataMap, RelationshipType};
use crate::quality::{score_if_eligible, QualityError, QualityScorer, RetentionTier};
use crate::storage::{HybridStore, StorageError, TimeRange};

/// Memories touched within this window are in scope for the `daily`
/// horizon's fixed recent window (§4.9).
const DAILY_WINDOW_DAYS: i64 = 2;
/// Per-run cap on the oldest-`last_consolidated_at`-first selection used
/// by `weekly` and wider horizons, so one run never starves other work.
const INCREMENTAL_BATCH_CAP: usize = 500;
const ASSOCIATION_SIMILARITY_MIN: f32 = 0.3;
const ASSOCIATION_SIMILARITY_MAX: f32 = 0.7;
const MIN_CLUSTER_SIZE_FOR_COMPRESSION: usize = 3;
const CLUSTER_EPS: f32 = 0.35;
const CLUSTER_MIN_POINTS: usize = 3;
const FORGET_INACTIVITY_DAYS: i64 = 90;
const FORGET_RELEVANCE_THRESHOLD: f32 = 0.2;
const DECAY_HALF_LIFE_DAYS: f64 = 30.0;
const SECS_PER_DAY: i64 = 86_400;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConsolidationError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Quality(#[from] QualityError),
    #[error(transparent)]
    Memvault(#[from] crate::error::MemvaultError),
}

/// Scheduler horizons (§4.9). Each has a phase gate (`runs_*` below).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeHorizon {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl TimeHorizon {
    fn runs_clustering(&self) -> bool {
        matches!(self, TimeHorizon::Weekly | TimeHorizon::Monthly | TimeHorizon::Quarterly)
    }

    fn runs_association(&self) -> bool {
        matches!(self, TimeHorizon::Weekly | TimeHorizon::Monthly)
    }

    fn runs_forgetting(&self) -> bool {
        matches!(self, TimeHorizon::Monthly | TimeHorizon::Quarterly | TimeHorizon::Yearly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsolidationPhase {
    Decay,
    Clustering,
    Association,
    Compression,
    Forgetting,
}

/// Result from a single consolidation phase.
#[derive(Debug, Clone)]
pub struct PhaseResult {
    pub phase: ConsolidationPhase,
    pub duration_ms: u64,
    pub memories_processed: usize,
    pub actions: Vec<String>,
}

/// Complete result from one scheduler firing.
#[derive(Debug, Clone)]
pub struct ConsolidationReport {
    pub horizon: TimeHorizon,
    pub phases: Vec<PhaseResult>,
    pub total_duration_ms: u64,
}

/// Runs a `QualityScorer` call off the async runtime thread (§5): scoring
/// is CPU-bound and must not block the sync engine's task alongside it.
async fn score_blocking(scorer: Arc<dyn QualityScorer>, memory: Memory) -> Result<Option<f32>, ConsolidationError> {
    tokio::task::spawn_blocking(move || score_if_eligible(scorer.as_ref(), &memory))
        .await
        .map_err(|e| ConsolidationError::Quality(QualityError::ScoringFailed(e.to_string())))?
        .map_err(ConsolidationError::from)
}

fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub struct ConsolidationEngine {
    store: Arc<HybridStore>,
    graph: GraphStore,
    scorer: Arc<dyn QualityScorer>,
    config: Config,
}

impl ConsolidationEngine {
    pub fn new(store: Arc<HybridStore>, scorer: Arc<dyn QualityScorer>, config: Config) -> Self {
        let local = store.local_handle();
        Self {
            graph: GraphStore::new(local),
            store,
            scorer,
            config,
        }
    }

    /// Run one horizon's phase-gated pipeline, bracketed by `pause_sync`/
    /// `resume_sync` so sync sees no interleaved activity for the hashes
    /// this run touches (§4.9, §5 ordering).
    pub async fn run(&self, horizon: TimeHorizon) -> Result<ConsolidationReport, ConsolidationError> {
        let total_start = Instant::now();
        let _guard = self.store.pause_sync().await;
        let now = now_secs();

        let memories = self.select_memories(horizon, now)?;
        let mut phases = Vec::new();

        phases.push(self.decay_phase(&memories, now).await?);

        let mut clusters = Vec::new();
        if horizon.runs_clustering() {
            let (result, found) = self.clustering_phase(&memories)?;
            phases.push(result);
            clusters = found;
        }

        if horizon.runs_association() {
            phases.push(self.association_phase(&memories)?);
        }

        if !clusters.is_empty() && self.config.consolidation_compression_enabled {
            phases.push(self.compression_phase(&clusters, &memories).await?);
        }

        if horizon.runs_forgetting() {
            phases.push(self.forgetting_phase(&memories, now).await?);
        }

        Ok(ConsolidationReport {
            horizon,
            phases,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        })
    }

    /// `daily` scans a fixed recent window; wider horizons select the
    /// oldest-`last_consolidated_at`-first, bounded per run (§4.9).
    fn select_memories(&self, horizon: TimeHorizon, now: i64) -> Result<Vec<Memory>, ConsolidationError> {
        if matches!(horizon, TimeHorizon::Daily) {
            let range = TimeRange {
                start: now - DAILY_WINDOW_DAYS * SECS_PER_DAY,
                end: now,
            };
            return Ok(self.store.search_time_range(range)?);
        }

        let mut all = self.store.search_time_range(TimeRange { start: 0, end: now })?;
        all.sort_by_key(|m| m.metadata.get(keys::LAST_CONSOLIDATED_AT).and_then(|v| v.as_f64()).unwrap_or(0.0) as i64);
        all.truncate(INCREMENTAL_BATCH_CAP);
        Ok(all)
    }

    /// Exponential-decay relevance scoring plus the association-based
    /// quality boost (§4.9): memories with in-degree+out-degree ≥
    /// `consolidation_min_connections_for_boost` get a multiplicative
    /// boost, capped at 1.0, with the unboosted score kept for audit.
    async fn decay_phase(&self, memories: &[Memory], now: i64) -> Result<PhaseResult, ConsolidationError> {
        let start = Instant::now();
        let mut updates = Vec::new();
        let mut boosted_count = 0;

        for memory in memories {
            let age_days = ((now - memory.created_at).max(0) as f64) / SECS_PER_DAY as f64;
            let relevance = (0.5_f64.powf(age_days / DECAY_HALF_LIFE_DAYS)) as f32;

            let mut patch = MetadataMap::new();
            patch.set_relevance_score(relevance);
            patch.insert(keys::LAST_CONSOLIDATED_AT, now as f64);

            if let Some(base_quality) = score_blocking(Arc::clone(&self.scorer), memory.clone()).await? {
                let degree = self.graph.degree(&memory.content_hash)?;
                if degree >= self.config.consolidation_min_connections_for_boost {
                    let boosted = (base_quality * self.config.consolidation_quality_boost_factor).min(1.0);
                    patch.insert(keys::QUALITY_SCORE, boosted as f64);
                    patch.insert(keys::QUALITY_PROVIDER, self.scorer.provider_code());
                    patch.insert(keys::QUALITY_BOOST_APPLIED, true);
                    patch.insert(keys::QUALITY_BOOST_FACTOR, self.config.consolidation_quality_boost_factor as f64);
                    patch.insert(
                        keys::QUALITY_BOOST_REASON,
                        format!("degree {degree} >= {}", self.config.consolidation_min_connections_for_boost),
                    );
                    patch.insert(keys::ORIGINAL_QUALITY_BEFORE_BOOST, base_quality as f64);
                    boosted_count += 1;
                } else {
                    patch.insert(keys::QUALITY_SCORE, base_quality as f64);
                    patch.insert(keys::QUALITY_PROVIDER, self.scorer.provider_code());
                }
            }

            updates.push((memory.content_hash.clone(), patch));
        }

        let updated = self.store.update_memories_batch(&updates).await?;

        Ok(PhaseResult {
            phase: ConsolidationPhase::Decay,
            duration_ms: start.elapsed().as_millis() as u64,
            memories_processed: updated,
            actions: vec![format!("decayed {} memories, boosted {boosted_count}", updates.len())],
        })
    }

    fn clustering_phase(&self, memories: &[Memory]) -> Result<(PhaseResult, Vec<Cluster>), ConsolidationError> {
        let start = Instant::now();
        let items: Vec<(String, Vec<f32>)> = memories
            .iter()
            .filter(|m| !m.metadata.is_system_generated())
            .map(|m| (m.content_hash.clone(), m.embedding.clone()))
            .collect();

        let clusters = cluster_embeddings(&items, CLUSTER_EPS, CLUSTER_MIN_POINTS);

        let phase = PhaseResult {
            phase: ConsolidationPhase::Clustering,
            duration_ms: start.elapsed().as_millis() as u64,
            memories_processed: items.len(),
            actions: vec![format!("found {} clusters among {} memories", clusters.len(), items.len())],
        };
        Ok((phase, clusters))
    }

    /// Discovers creative associations: edges in the 0.3-0.7 similarity
    /// band (too similar is redundancy, not insight; too dissimilar is
    /// noise) (§4.9).
    fn association_phase(&self, memories: &[Memory]) -> Result<PhaseResult, ConsolidationError> {
        let start = Instant::now();
        let mut discovered = 0;

        for i in 0..memories.len() {
            for j in (i + 1)..memories.len() {
                let similarity = cosine_similarity(&memories[i].embedding, &memories[j].embedding);
                if similarity >= ASSOCIATION_SIMILARITY_MIN && similarity <= ASSOCIATION_SIMILARITY_MAX {
                    self.graph.store_association(&Edge {
                        source_hash: memories[i].content_hash.clone(),
                        target_hash: memories[j].content_hash.clone(),
                        relationship_type: RelationshipType::Related,
                        similarity,
                        connection_types: vec!["association".to_string()],
                    })?;
                    discovered += 1;
                }
            }
        }

        Ok(PhaseResult {
            phase: ConsolidationPhase::Association,
            duration_ms: start.elapsed().as_millis() as u64,
            memories_processed: memories.len(),
            actions: vec![format!("discovered {discovered} creative associations")],
        })
    }

    /// Writes a summary memory per qualifying cluster, tagged
    /// `type=compressed_cluster`. Originals are preserved untouched (§4.9).
    async fn compression_phase(&self, clusters: &[Cluster], memories: &[Memory]) -> Result<PhaseResult, ConsolidationError> {
        let start = Instant::now();
        let by_hash: HashMap<&str, &Memory> = memories.iter().map(|m| (m.content_hash.as_str(), m)).collect();
        let mut compressed = 0;

        for cluster in clusters {
            if cluster.members.len() < MIN_CLUSTER_SIZE_FOR_COMPRESSION {
                continue;
            }
            let mut summary_lines = Vec::new();
            let mut tags = std::collections::BTreeSet::new();
            tags.insert("compressed_cluster".to_string());
            for hash in &cluster.members {
                if let Some(member) = by_hash.get(hash.as_str()) {
                    let excerpt: String = member.content.chars().take(120).collect();
                    summary_lines.push(format!("- {excerpt}"));
                    tags.extend(member.tags.iter().cloned());
                }
            }
            let content = format!("Consolidated summary of {} related memories:\n{}", cluster.members.len(), summary_lines.join("\n"));

            let mut metadata = MetadataMap::new();
            metadata.insert(keys::TYPE, keys::TYPE_COMPRESSED_CLUSTER);
            metadata.insert("source_memory_count", cluster.members.len() as i64);

            let summary = Memory::new(content, tags, Some(keys::TYPE_COMPRESSED_CLUSTER.to_string()), metadata, cluster.centroid.clone(), now_secs())
                .map_err(|e| ConsolidationError::Storage(StorageError::BatchFailed(e.to_string())))?;

            let outcome = self.store.store(summary).await?;
            if outcome.created {
                for hash in &cluster.members {
                    if let Some(member) = by_hash.get(hash.as_str()) {
                        let similarity = cosine_similarity(&member.embedding, &cluster.centroid);
                        self.graph.store_association(&Edge {
                            source_hash: outcome.content_hash.clone(),
                            target_hash: hash.clone(),
                            relationship_type: RelationshipType::Related,
                            similarity,
                            connection_types: vec!["cluster_member".to_string()],
                        })?;
                    }
                }
                compressed += 1;
            }
        }

        Ok(PhaseResult {
            phase: ConsolidationPhase::Compression,
            duration_ms: start.elapsed().as_millis() as u64,
            memories_processed: clusters.iter().map(|c| c.members.len()).sum(),
            actions: vec![format!("wrote {compressed} compressed-cluster summaries")],
        })
    }

    /// Archives memories inactive ≥ 90 days (or past their retention
    /// tier's window, whichever is longer) whose relevance is below
    /// threshold (§4.9, §4.10).
    async fn forgetting_phase(&self, memories: &[Memory], now: i64) -> Result<PhaseResult, ConsolidationError> {
        let start = Instant::now();
        let mut updates = Vec::new();

        for memory in memories {
            if memory.metadata.is_archived() {
                continue;
            }
            let inactive_days = ((now - memory.updated_at).max(0)) / SECS_PER_DAY;
            let relevance = memory.metadata.relevance_score().unwrap_or(1.0);
            if relevance >= FORGET_RELEVANCE_THRESHOLD {
                continue;
            }

            let quality = memory.metadata.quality_score().unwrap_or(0.0);
            let tier = RetentionTier::from_quality(quality);
            let required_days = FORGET_INACTIVITY_DAYS.max(tier.min_retention_days(&self.config));

            if inactive_days >= required_days {
                let mut patch = MetadataMap::new();
                patch.insert(keys::ARCHIVED, true);
                updates.push((memory.content_hash.clone(), patch));
            }
        }

        let archived = self.store.update_memories_batch(&updates).await?;

        Ok(PhaseResult {
            phase: ConsolidationPhase::Forgetting,
            duration_ms: start.elapsed().as_millis() as u64,
            memories_processed: memories.len(),
            actions: vec![format!("archived {archived} memories")],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{DeterministicEmbedder, Embedder};
    use crate::quality::DeterministicQualityScorer;
    use crate::storage::{CloudConfig, CloudStore, LocalStore};

    fn engine() -> (Arc<HybridStore>, ConsolidationEngine) {
        let dir = tempfile::tempdir().unwrap();
        let local = Arc::new(LocalStore::open(Some(dir.path().join("c.db")), 15_000, 64_000).unwrap());
        std::mem::forget(dir);
        let cloud = Arc::new(CloudStore::new(CloudConfig::new("https://example.invalid", "token")));
        let store = HybridStore::new(
            local,
            cloud,
            crate::sync::SyncConfig::default(),
            std::env::temp_dir().join("memvault_consolidation_test_dlq.jsonl"),
        );
        let scorer = Arc::new(DeterministicQualityScorer::default());
        let config = Config::default();
        let engine = ConsolidationEngine::new(Arc::clone(&store), scorer, config);
        (store, engine)
    }

    async fn seed(store: &HybridStore, text: &str, hot: usize, age_secs: i64) -> Memory {
        let embedder = DeterministicEmbedder::default();
        let embedding = embedder.embed_one(text).unwrap();
        let mut unit = vec![0.0_f32; embedding.len()];
        unit[hot % unit.len()] = 1.0;
        let created_at = now_secs() - age_secs;
        let memory = Memory::new(text, vec![], None, MetadataMap::new(), unit, created_at).unwrap();
        let outcome = store.store(memory.clone()).await.unwrap();
        let mut stored = memory;
        stored.content_hash = outcome.content_hash;
        stored
    }

    #[tokio::test]
    async fn decay_phase_scores_fresh_memories_near_full_relevance() {
        let (store, engine) = engine();
        let memory = seed(&store, "fresh memory", 0, 0).await;
        let now = now_secs();

        let result = engine.decay_phase(&[memory.clone()], now).await.unwrap();
        assert_eq!(result.phase, ConsolidationPhase::Decay);
        assert_eq!(result.memories_processed, 1);

        let updated = store.get(&memory.content_hash).await.unwrap().unwrap();
        let relevance = updated.metadata.relevance_score().unwrap();
        assert!(relevance > 0.95, "fresh memory should retain most relevance, got {relevance}");
    }

    #[tokio::test]
    async fn decay_phase_decays_old_memories() {
        let (store, engine) = engine();
        let memory = seed(&store, "ancient memory", 1, 30 * SECS_PER_DAY).await;
        let now = now_secs();

        engine.decay_phase(&[memory.clone()], now).await.unwrap();
        let updated = store.get(&memory.content_hash).await.unwrap().unwrap();
        let relevance = updated.metadata.relevance_score().unwrap();
        assert!((relevance - 0.5).abs() < 0.05, "one half-life should roughly halve relevance, got {relevance}");
    }

    #[tokio::test]
    async fn decay_phase_boosts_well_connected_memories() {
        let (store, engine) = engine();
        let memory = seed(&store, "hub memory", 0, 0).await;
        let config = engine.config.clone();
        for i in 0..config.consolidation_min_connections_for_boost {
            let other = seed(&store, &format!("spoke memory {i}"), i + 1, 0).await;
            engine
                .graph
                .store_association(&Edge {
                    source_hash: memory.content_hash.clone(),
                    target_hash: other.content_hash.clone(),
                    relationship_type: RelationshipType::Related,
                    similarity: 0.5,
                    connection_types: vec!["association".to_string()],
                })
                .unwrap();
        }

        engine.decay_phase(&[memory.clone()], now_secs()).await.unwrap();
        let updated = store.get(&memory.content_hash).await.unwrap().unwrap();
        assert!(updated.metadata.get(keys::QUALITY_BOOST_APPLIED).is_some());
        assert!(updated.metadata.get(keys::ORIGINAL_QUALITY_BEFORE_BOOST).is_some());
        let boosted = updated.metadata.quality_score().unwrap();
        assert!(boosted <= 1.0);
    }

    #[tokio::test]
    async fn clustering_phase_groups_similar_memories_and_skips_system_generated() {
        let (store, engine) = engine();
        let a = seed(&store, "cluster member a", 0, 0).await;
        let b = seed(&store, "cluster member b", 0, 0).await;
        let c = seed(&store, "cluster member c", 0, 0).await;
        let mut summary_metadata = MetadataMap::new();
        summary_metadata.insert(keys::TYPE, keys::TYPE_COMPRESSED_CLUSTER);
        let summary = Memory::new("a prior summary", vec![], None, summary_metadata, vec![0.0; 384], 0).unwrap();

        let (result, clusters) = engine.clustering_phase(&[a, b, c, summary]).unwrap();
        assert_eq!(result.phase, ConsolidationPhase::Clustering);
        assert_eq!(result.memories_processed, 3, "system-generated memory must be excluded");
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 3);
    }

    #[tokio::test]
    async fn association_phase_links_only_memories_in_the_similarity_band() {
        let (store, engine) = engine();
        let a = seed(&store, "a", 0, 0).await;
        let b = seed(&store, "b", 1, 0).await;

        let result = engine.association_phase(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(result.phase, ConsolidationPhase::Association);

        let hops = engine.graph.find_connected(&a.content_hash, None, crate::graph::Direction::Both, 1).unwrap();
        let similarity = crate::embeddings::cosine_similarity(&a.embedding, &b.embedding);
        let expect_edge = (ASSOCIATION_SIMILARITY_MIN..=ASSOCIATION_SIMILARITY_MAX).contains(&similarity);
        assert_eq!(!hops.is_empty(), expect_edge);
    }

    #[tokio::test]
    async fn compression_phase_writes_summary_and_links_members() {
        let (store, engine) = engine();
        let a = seed(&store, "compress member a", 0, 0).await;
        let b = seed(&store, "compress member b", 0, 0).await;
        let c = seed(&store, "compress member c", 0, 0).await;
        let memories = vec![a.clone(), b.clone(), c.clone()];

        let (_, clusters) = engine.clustering_phase(&memories).unwrap();
        assert_eq!(clusters.len(), 1);

        let result = engine.compression_phase(&clusters, &memories).await.unwrap();
        assert_eq!(result.phase, ConsolidationPhase::Compression);
        assert_eq!(result.actions[0], "wrote 1 compressed-cluster summaries");

        let hops = engine.graph.find_connected(&a.content_hash, None, crate::graph::Direction::Both, 1).unwrap();
        assert_eq!(hops.len(), 1, "each member should be linked to the new summary memory");
    }

    #[tokio::test]
    async fn forgetting_phase_archives_stale_low_relevance_memories() {
        let (store, engine) = engine();
        let memory = seed(&store, "stale memory", 0, 120 * SECS_PER_DAY).await;
        let mut patch = MetadataMap::new();
        patch.set_relevance_score(0.01);
        store.update_metadata(&memory.content_hash, patch).await.unwrap();
        let stale = store.get(&memory.content_hash).await.unwrap().unwrap();

        let result = engine.forgetting_phase(&[stale], now_secs()).await.unwrap();
        assert_eq!(result.phase, ConsolidationPhase::Forgetting);
        assert_eq!(result.actions[0], "archived 1 memories");

        let updated = store.get(&memory.content_hash).await.unwrap().unwrap();
        assert!(updated.metadata.is_archived());
    }

    #[tokio::test]
    async fn forgetting_phase_spares_recently_active_low_relevance_memories() {
        let (store, engine) = engine();
        let memory = seed(&store, "recent but irrelevant", 0, 1).await;
        let mut patch = MetadataMap::new();
        patch.set_relevance_score(0.01);
        store.update_metadata(&memory.content_hash, patch).await.unwrap();
        let recent = store.get(&memory.content_hash).await.unwrap().unwrap();

        engine.forgetting_phase(&[recent], now_secs()).await.unwrap();
        let updated = store.get(&memory.content_hash).await.unwrap().unwrap();
        assert!(!updated.metadata.is_archived());
    }

    #[tokio::test]
    async fn daily_horizon_only_runs_decay() {
        let (store, engine) = engine();
        seed(&store, "daily scoped memory", 0, 0).await;

        let report = engine.run(TimeHorizon::Daily).await.unwrap();
        assert_eq!(report.phases.len(), 1);
        assert_eq!(report.phases[0].phase, ConsolidationPhase::Decay);
    }

    #[tokio::test]
    async fn monthly_horizon_runs_decay_clustering_association_and_forgetting() {
        let (store, engine) = engine();
        for i in 0..3 {
            seed(&store, &format!("monthly memory {i}"), 0, 0).await;
        }

        let report = engine.run(TimeHorizon::Monthly).await.unwrap();
        let phases: Vec<ConsolidationPhase> = report.phases.iter().map(|p| p.phase).collect();
        assert!(phases.contains(&ConsolidationPhase::Decay));
        assert!(phases.contains(&ConsolidationPhase::Clustering));
        assert!(phases.contains(&ConsolidationPhase::Association));
        assert!(phases.contains(&ConsolidationPhase::Forgetting));
    }

    #[tokio::test]
    async fn weekly_horizon_does_not_run_forgetting() {
        let (store, engine) = engine();
        seed(&store, "weekly memory", 0, 0).await;

        let report = engine.run(TimeHorizon::Weekly).await.unwrap();
        let phases: Vec<ConsolidationPhase> = report.phases.iter().map(|p| p.phase).collect();
        assert!(phases.contains(&ConsolidationPhase::Association));
        assert!(!phases.contains(&ConsolidationPhase::Forgetting));
    }
}
