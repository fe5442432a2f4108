//! In-process vector index backing `LocalStore.search_semantic`
//!
//! HNSW via USearch when the `vector-search` feature is enabled (20x
//! faster than brute-force for large corpora, per the teacher's
//! `search::vector`), falling back to an O(n·d) brute-force cosine scan
//! otherwise — both expose the same small surface so `LocalStore` does
//! not need to know which one it holds.

/// Vector index error types.
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum VectorIndexError {
    #[error("index creation failed: {0}")]
    Creation(String),
    #[error("failed to add vector: {0}")]
    Add(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("invalid dimensions: expected {expected}, got {got}")]
    InvalidDimensions { expected: usize, got: usize },
}

#[cfg(feature = "vector-search")]
pub use usearch_backed::VectorIndex;

#[cfg(not(feature = "vector-search"))]
pub use bruteforce::VectorIndex;

#[cfg(feature = "vector-search")]
mod usearch_backed {
    use super::VectorIndexError;
    use std::collections::HashMap;
    use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

    const DEFAULT_CONNECTIVITY: usize = 16;
    const DEFAULT_EXPANSION_ADD: usize = 128;
    const DEFAULT_EXPANSION_SEARCH: usize = 64;

    /// HNSW-backed nearest-neighbor index keyed by `content_hash`.
    pub struct VectorIndex {
        index: Index,
        dimensions: usize,
        key_to_id: HashMap<String, u64>,
        id_to_key: HashMap<u64, String>,
        next_id: u64,
    }

    impl VectorIndex {
        pub fn new(dimensions: usize) -> Result<Self, VectorIndexError> {
            let options = IndexOptions {
                dimensions,
                metric: MetricKind::Cos,
                quantization: ScalarKind::F32,
                connectivity: DEFAULT_CONNECTIVITY,
                expansion_add: DEFAULT_EXPANSION_ADD,
                expansion_search: DEFAULT_EXPANSION_SEARCH,
                multi: false,
            };
            let index =
                Index::new(&options).map_err(|e| VectorIndexError::Creation(e.to_string()))?;
            Ok(Self {
                index,
                dimensions,
                key_to_id: HashMap::new(),
                id_to_key: HashMap::new(),
                next_id: 0,
            })
        }

        pub fn len(&self) -> usize {
            self.index.size()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        pub fn add(&mut self, key: &str, vector: &[f32]) -> Result<(), VectorIndexError> {
            if vector.len() != self.dimensions {
                return Err(VectorIndexError::InvalidDimensions {
                    expected: self.dimensions,
                    got: vector.len(),
                });
            }

            if let Some(&existing) = self.key_to_id.get(key) {
                let _ = self.index.remove(existing);
                self.reserve_for_one()?;
                self.index
                    .add(existing, vector)
                    .map_err(|e| VectorIndexError::Add(e.to_string()))?;
                return Ok(());
            }

            self.reserve_for_one()?;
            let id = self.next_id;
            self.next_id += 1;
            self.index
                .add(id, vector)
                .map_err(|e| VectorIndexError::Add(e.to_string()))?;
            self.key_to_id.insert(key.to_string(), id);
            self.id_to_key.insert(id, key.to_string());
            Ok(())
        }

        pub fn remove(&mut self, key: &str) -> bool {
            if let Some(id) = self.key_to_id.remove(key) {
                self.id_to_key.remove(&id);
                let _ = self.index.remove(id);
                true
            } else {
                false
            }
        }

        pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(String, f32)>, VectorIndexError> {
            if query.len() != self.dimensions {
                return Err(VectorIndexError::InvalidDimensions {
                    expected: self.dimensions,
                    got: query.len(),
                });
            }
            if self.is_empty() {
                return Ok(vec![]);
            }

            let results = self
                .index
                .search(query, limit)
                .map_err(|e| VectorIndexError::Search(e.to_string()))?;

            Ok(results
                .keys
                .iter()
                .zip(results.distances.iter())
                .filter_map(|(id, distance)| {
                    self.id_to_key.get(id).map(|key| (key.clone(), 1.0 - distance))
                })
                .collect())
        }

        fn reserve_for_one(&self) -> Result<(), VectorIndexError> {
            let capacity = self.index.capacity();
            let size = self.index.size();
            if size >= capacity {
                let new_capacity = std::cmp::max(capacity * 2, 16);
                self.index
                    .reserve(new_capacity)
                    .map_err(|e| VectorIndexError::Creation(e.to_string()))?;
            }
            Ok(())
        }
    }
}

#[cfg(not(feature = "vector-search"))]
mod bruteforce {
    use super::VectorIndexError;
    use crate::embeddings::cosine_similarity;
    use std::collections::HashMap;

    /// Brute-force O(n·d) cosine scan. Adequate at the corpus sizes this
    /// crate's bounded-batch operations (consolidation, drift scans) work
    /// over; a real deployment would enable the `vector-search` feature.
    pub struct VectorIndex {
        dimensions: usize,
        vectors: HashMap<String, Vec<f32>>,
    }

    impl VectorIndex {
        pub fn new(dimensions: usize) -> Result<Self, VectorIndexError> {
            Ok(Self {
                dimensions,
                vectors: HashMap::new(),
            })
        }

        pub fn len(&self) -> usize {
            self.vectors.len()
        }

        pub fn is_empty(&self) -> bool {
            self.vectors.is_empty()
        }

        pub fn add(&mut self, key: &str, vector: &[f32]) -> Result<(), VectorIndexError> {
            if vector.len() != self.dimensions {
                return Err(VectorIndexError::InvalidDimensions {
                    expected: self.dimensions,
                    got: vector.len(),
                });
            }
            self.vectors.insert(key.to_string(), vector.to_vec());
            Ok(())
        }

        pub fn remove(&mut self, key: &str) -> bool {
            self.vectors.remove(key).is_some()
        }

        pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(String, f32)>, VectorIndexError> {
            if query.len() != self.dimensions {
                return Err(VectorIndexError::InvalidDimensions {
                    expected: self.dimensions,
                    got: query.len(),
                });
            }
            let mut scored: Vec<(String, f32)> = self
                .vectors
                .iter()
                .map(|(key, vector)| (key.clone(), cosine_similarity(query, vector)))
                .collect();
            // Descending score, ties broken deterministically by content_hash (§8 property 2).
            scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            scored.truncate(limit);
            Ok(scored)
        }
    }
}
