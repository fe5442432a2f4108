//! Deterministic test-double quality scorer
//!
//! Hash-based pseudo-score so consolidation/quality plumbing can be
//! exercised without a real scoring model, mirroring
//! `embeddings::testing::DeterministicEmbedder`.

use super::{QualityError, QualityScorer};
use crate::memory::Memory;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Default)]
pub struct DeterministicQualityScorer;

impl QualityScorer for DeterministicQualityScorer {
    fn score(&self, memory: &Memory) -> Result<f32, QualityError> {
        let mut hasher = DefaultHasher::new();
        memory.content.hash(&mut hasher);
        let h = hasher.finish();
        Ok((h % 1000) as f32 / 1000.0)
    }

    fn provider_code(&self) -> &'static str {
        "deterministic-test"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MetadataMap;

    #[test]
    fn score_is_deterministic_and_in_range() {
        let scorer = DeterministicQualityScorer::default();
        let memory = Memory::new("hello", vec![], None, MetadataMap::new(), vec![1.0; 384], 0).unwrap();
        let a = scorer.score(&memory).unwrap();
        let b = scorer.score(&memory).unwrap();
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a));
    }
}
