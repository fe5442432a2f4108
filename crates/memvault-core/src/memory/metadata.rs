//! Tagged-value metadata map
//!
//! The source system leans on untyped mappings for metadata. Here that
//! becomes a tagged-value enum plus typed accessors for the reserved
//! keys (§3.3), with unknown keys passed through verbatim.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Int(i64),
    F64(f64),
    Bool(bool),
    Null,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}
impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::F64(f)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Reserved metadata keys (§3.3). `type` is handled separately because it
/// carries the system-generated-memory marker used across several
/// components (quality scoring exclusion, sync policy).
pub mod keys {
    pub const QUALITY_SCORE: &str = "quality_score";
    pub const RELEVANCE_SCORE: &str = "relevance_score";
    pub const QUALITY_PROVIDER: &str = "quality_provider";
    pub const AI_SCORES: &str = "ai_scores";
    pub const LAST_CONSOLIDATED_AT: &str = "last_consolidated_at";
    pub const QUALITY_BOOST_APPLIED: &str = "quality_boost_applied";
    pub const QUALITY_BOOST_FACTOR: &str = "quality_boost_factor";
    pub const QUALITY_BOOST_REASON: &str = "quality_boost_reason";
    pub const ORIGINAL_QUALITY_BEFORE_BOOST: &str = "original_quality_before_boost";
    pub const TYPE: &str = "type";

    pub const TYPE_ASSOCIATION: &str = "association";
    pub const TYPE_COMPRESSED_CLUSTER: &str = "compressed_cluster";

    pub const ARCHIVED: &str = "archived";
    pub const ARCHIVE_TAG: &str = "archived";
}

/// An ordered metadata map. `BTreeMap` (not `HashMap`) so iteration order
/// is deterministic — MetadataCodec's determinism invariant (§4.4) and
/// change-detection in the drift scanner both depend on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataMap(pub BTreeMap<String, Value>);

impl MetadataMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Merge `patch` into `self`, overwriting existing keys (used by
    /// `update_metadata` and `update_memories_batch`).
    pub fn merge(&mut self, patch: MetadataMap) {
        for (k, v) in patch.0 {
            self.0.insert(k, v);
        }
    }

    pub fn quality_score(&self) -> Option<f32> {
        self.get(keys::QUALITY_SCORE).and_then(Value::as_f64).map(|f| f as f32)
    }

    pub fn set_quality_score(&mut self, score: f32) {
        self.insert(keys::QUALITY_SCORE, score as f64);
    }

    pub fn relevance_score(&self) -> Option<f32> {
        self.get(keys::RELEVANCE_SCORE).and_then(Value::as_f64).map(|f| f as f32)
    }

    pub fn set_relevance_score(&mut self, score: f32) {
        self.insert(keys::RELEVANCE_SCORE, score as f64);
    }

    pub fn is_system_generated(&self) -> bool {
        matches!(
            self.get(keys::TYPE).and_then(Value::as_str),
            Some(keys::TYPE_ASSOCIATION) | Some(keys::TYPE_COMPRESSED_CLUSTER)
        )
    }

    pub fn is_archived(&self) -> bool {
        self.get(keys::ARCHIVED).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn encoded_size_estimate(&self) -> usize {
        serde_json::to_vec(&self.0).map(|b| b.len()).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_existing_keys() {
        let mut base = MetadataMap::new();
        base.insert("a", "old");
        base.insert("b", 1i64);

        let mut patch = MetadataMap::new();
        patch.insert("a", "new");
        patch.insert("c", true);

        base.merge(patch);

        assert_eq!(base.get("a").unwrap().as_str(), Some("new"));
        assert_eq!(base.get("b").unwrap().as_f64(), Some(1.0));
        assert_eq!(base.get("c").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn system_generated_detection() {
        let mut m = MetadataMap::new();
        assert!(!m.is_system_generated());
        m.insert(keys::TYPE, keys::TYPE_ASSOCIATION);
        assert!(m.is_system_generated());
    }

    #[test]
    fn deterministic_iteration_order() {
        let mut m = MetadataMap::new();
        m.insert("z", "1");
        m.insert("a", "2");
        let keys: Vec<&String> = m.0.keys().collect();
        assert_eq!(keys, vec!["a", "z"]);
    }
}
