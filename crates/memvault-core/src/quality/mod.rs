//! Quality subsystem (C10)
//!
//! Pluggable per-memory quality scoring plus quality-boosted re-ranking of
//! semantic search results. Mirrors `Embedder`'s shape: a `Send + Sync`
//! trait with a deterministic test double for exercising the storage/
//! consolidation plumbing without a real scorer.

mod testing;

pub use testing::DeterministicQualityScorer;

use crate::memory::{keys, Memory};
use crate::storage::ScoredMemory;

/// QualityScorer errors.
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum QualityError {
    #[error("quality scoring failed: {0}")]
    ScoringFailed(String),
}

/// Produces a quality score in `[0, 1]` for a memory. System-generated
/// memories (`type ∈ {association, compressed_cluster}`) are never passed
/// to a scorer — callers check `MetadataMap::is_system_generated` first.
pub trait QualityScorer: Send + Sync {
    fn score(&self, memory: &Memory) -> Result<f32, QualityError>;
    fn provider_code(&self) -> &'static str;
}

/// Retention tier assigned by quality score (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionTier {
    High,
    Medium,
    Low,
}

impl RetentionTier {
    pub fn from_quality(quality: f32) -> Self {
        if quality >= 0.7 {
            RetentionTier::High
        } else if quality >= 0.5 {
            RetentionTier::Medium
        } else {
            RetentionTier::Low
        }
    }

    /// Minimum days a memory in this tier is kept before the forgetting
    /// phase may consider it, per the configured retention floors.
    pub fn min_retention_days(&self, config: &crate::config::Config) -> i64 {
        match self {
            RetentionTier::High => config.retention_high_min_days,
            RetentionTier::Medium => config.retention_medium_min_days,
            RetentionTier::Low => config.retention_low_min_days,
        }
    }
}

/// Score a memory, unless it's system-generated (excluded per §4.10).
pub fn score_if_eligible(scorer: &dyn QualityScorer, memory: &Memory) -> Result<Option<f32>, QualityError> {
    if memory.metadata.is_system_generated() {
        return Ok(None);
    }
    scorer.score(memory).map(Some)
}

/// Stamp a freshly computed quality score and its provider onto metadata.
pub fn apply_score(memory: &mut Memory, scorer: &dyn QualityScorer, quality: f32) {
    memory.metadata.set_quality_score(quality);
    memory.metadata.insert(keys::QUALITY_PROVIDER, scorer.provider_code());
}

/// Re-rank semantic search hits by `(1 - w) * cosine + w * quality`
/// (§4.10). Memories without a stored quality score are treated as
/// quality `0.0`, consistent with "unscored" rather than "neutral" — a
/// freshly-created memory hasn't earned a boost yet.
pub fn quality_boosted_rerank(mut results: Vec<ScoredMemory>, weight: f32) -> Vec<ScoredMemory> {
    let weight = weight.clamp(0.0, 1.0);
    for hit in &mut results {
        let quality = hit.memory.metadata.quality_score().unwrap_or(0.0);
        hit.score = (1.0 - weight) * hit.score + weight * quality;
    }
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results
}
