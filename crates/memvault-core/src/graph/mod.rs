//! Graph store (C8)
//!
//! Directed associations between memories, layered on top of
//! `LocalStore`'s `memory_graph` primitives (`insert_edge`/`edges_touching`).
//! BFS traversal with a visited set, modeled on the neighbor-walk-with-guard
//! shape seen in `other_examples`' engram graph module.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::memory::RelationshipType;
use crate::storage::{LocalStore, StorageError};

/// An association to store between two memories.
#[derive(Debug, Clone)]
pub struct Edge {
    pub source_hash: String,
    pub target_hash: String,
    pub relationship_type: RelationshipType,
    pub similarity: f32,
    pub connection_types: Vec<String>,
}

/// Which direction an edge must face, relative to the query vertex, to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A memory reached during a traversal, with the depth and similarity it
/// was reached at.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedHop {
    pub hash: String,
    pub depth: u32,
    pub similarity: f32,
}

pub struct GraphStore {
    local: Arc<LocalStore>,
}

impl GraphStore {
    pub fn new(local: Arc<LocalStore>) -> Self {
        Self { local }
    }

    /// Persist an association (§4.8). Symmetric relationship types are
    /// inserted in both directions by `LocalStore::insert_edge` itself.
    pub fn store_association(&self, edge: &Edge) -> Result<(), StorageError> {
        self.local.insert_edge(
            &edge.source_hash,
            &edge.target_hash,
            edge.relationship_type,
            edge.similarity,
            &edge.connection_types,
            &crate::memory::MetadataMap::new(),
        )
    }

    /// k-hop BFS from `hash`, honoring `relationship_type` (if given) and
    /// `direction`. Cycles are broken by a visited set; results are ordered
    /// by depth then by descending similarity (§4.8).
    pub fn find_connected(
        &self,
        hash: &str,
        relationship_type: Option<RelationshipType>,
        direction: Direction,
        max_hops: u32,
    ) -> Result<Vec<ConnectedHop>, StorageError> {
        let max_hops = max_hops.min(3);
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(hash.to_string());
        let mut frontier: VecDeque<(String, u32)> = VecDeque::new();
        frontier.push_back((hash.to_string(), 0));
        let mut found: Vec<ConnectedHop> = Vec::new();

        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= max_hops {
                continue;
            }
            for (neighbor, edge_type, similarity) in
                self.neighbors(&current, relationship_type, direction)?
            {
                let _ = edge_type;
                if visited.contains(&neighbor) {
                    continue;
                }
                visited.insert(neighbor.clone());
                found.push(ConnectedHop {
                    hash: neighbor.clone(),
                    depth: depth + 1,
                    similarity,
                });
                frontier.push_back((neighbor, depth + 1));
            }
        }

        found.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then_with(|| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal))
        });
        Ok(found)
    }

    /// BFS shortest path between `h1` and `h2` (all edges weight 1); ties
    /// are broken by maximum aggregate similarity along the path (§4.8).
    /// Processed one depth level at a time so every same-depth candidate
    /// that reaches `h2` is compared before a winner is picked — an
    /// early exit on the first hit would let sibling order, not
    /// similarity, decide ties.
    pub fn shortest_path(&self, h1: &str, h2: &str, max_hops: u32) -> Result<Option<Vec<String>>, StorageError> {
        if h1 == h2 {
            return Ok(Some(vec![h1.to_string()]));
        }
        let max_hops = max_hops.min(5);
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(h1.to_string());
        let mut frontier: Vec<(String, Vec<String>, f32)> = vec![(h1.to_string(), vec![h1.to_string()], 0.0)];
        let mut best: Option<(Vec<String>, f32)> = None;

        for _ in 0..max_hops {
            if frontier.is_empty() {
                break;
            }
            let mut next_frontier: Vec<(String, Vec<String>, f32)> = Vec::new();

            for (current, path, aggregate_similarity) in &frontier {
                for (neighbor, _edge_type, similarity) in self.neighbors(current, None, Direction::Both)? {
                    if visited.contains(&neighbor) {
                        continue;
                    }
                    let mut next_path = path.clone();
                    next_path.push(neighbor.clone());
                    let next_aggregate = aggregate_similarity + similarity;

                    if neighbor == h2 {
                        let replace = match &best {
                            None => true,
                            Some((_, existing_aggregate)) => next_aggregate > *existing_aggregate,
                        };
                        if replace {
                            best = Some((next_path, next_aggregate));
                        }
                        // A shortest path to h2 never needs to continue past h2 itself.
                        continue;
                    }

                    visited.insert(neighbor.clone());
                    next_frontier.push((neighbor, next_path, next_aggregate));
                }
            }

            // Every same-depth candidate has now been compared; only now
            // is it safe to stop, since deeper levels can't produce a
            // shorter path.
            if best.is_some() {
                break;
            }
            frontier = next_frontier;
        }

        Ok(best.map(|(path, _)| path))
    }

    /// All memories reachable from `hash` within `radius` hops, both
    /// directions, plus the edges between them (§4.8).
    pub fn subgraph(&self, hash: &str, radius: u32) -> Result<Vec<ConnectedHop>, StorageError> {
        let mut hops = self.find_connected(hash, None, Direction::Both, radius.min(3))?;
        hops.insert(
            0,
            ConnectedHop {
                hash: hash.to_string(),
                depth: 0,
                similarity: 1.0,
            },
        );
        Ok(hops)
    }

    /// In-degree + out-degree across the graph, used by consolidation's
    /// association-based quality boost (§4.9).
    pub fn degree(&self, hash: &str) -> Result<usize, StorageError> {
        Ok(self.local.edges_touching(hash)?.len())
    }

    fn neighbors(
        &self,
        hash: &str,
        relationship_type: Option<RelationshipType>,
        direction: Direction,
    ) -> Result<Vec<(String, String, f32)>, StorageError> {
        let edges = self.local.edges_touching(hash)?;
        let mut out = Vec::new();
        for edge in edges {
            if let Some(want) = relationship_type {
                if edge.relationship_type != want.as_str() {
                    continue;
                }
            }
            let is_outgoing = edge.source_hash == hash;
            let other = if is_outgoing { &edge.target_hash } else { &edge.source_hash };
            if other == hash {
                continue;
            }
            let matches_direction = match direction {
                Direction::Both => true,
                Direction::Outgoing => is_outgoing,
                Direction::Incoming => !is_outgoing,
            };
            if matches_direction {
                out.push((other.clone(), edge.relationship_type.clone(), edge.similarity));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{DeterministicEmbedder, Embedder};
    use crate::memory::{Memory, MetadataMap};
    use crate::storage::LocalStore;

    fn store_with(local: &LocalStore, text: &str) -> String {
        let embedder = DeterministicEmbedder::default();
        let embedding = embedder.embed_one(text).unwrap();
        let memory = Memory::new(text, vec![], None, MetadataMap::new(), embedding, 0).unwrap();
        local.store(memory).unwrap().content_hash
    }

    fn local_store() -> Arc<LocalStore> {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(Some(dir.path().join("g.db")), 15_000, 64_000).unwrap();
        std::mem::forget(dir);
        Arc::new(store)
    }

    #[test]
    fn asymmetric_edge_respects_direction() {
        let local = local_store();
        let m1 = store_with(&local, "cause memory");
        let m2 = store_with(&local, "effect memory");
        let graph = GraphStore::new(Arc::clone(&local));

        graph
            .store_association(&Edge {
                source_hash: m1.clone(),
                target_hash: m2.clone(),
                relationship_type: RelationshipType::Causes,
                similarity: 0.8,
                connection_types: vec![],
            })
            .unwrap();

        let incoming = graph
            .find_connected(&m2, Some(RelationshipType::Causes), Direction::Incoming, 1)
            .unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].hash, m1);

        let outgoing = graph
            .find_connected(&m2, None, Direction::Outgoing, 1)
            .unwrap();
        assert!(outgoing.is_empty());
    }

    #[test]
    fn symmetric_edge_is_found_from_either_endpoint() {
        let local = local_store();
        let m1 = store_with(&local, "alpha memory");
        let m2 = store_with(&local, "beta memory");
        let graph = GraphStore::new(Arc::clone(&local));

        graph
            .store_association(&Edge {
                source_hash: m1.clone(),
                target_hash: m2.clone(),
                relationship_type: RelationshipType::Related,
                similarity: 0.5,
                connection_types: vec![],
            })
            .unwrap();

        assert_eq!(graph.find_connected(&m1, None, Direction::Both, 1).unwrap().len(), 1);
        assert_eq!(graph.find_connected(&m2, None, Direction::Both, 1).unwrap().len(), 1);
    }

    #[test]
    fn find_connected_orders_by_depth_then_similarity() {
        let local = local_store();
        let m1 = store_with(&local, "root memory");
        let m2 = store_with(&local, "near memory");
        let m3 = store_with(&local, "far memory");
        let graph = GraphStore::new(Arc::clone(&local));

        graph
            .store_association(&Edge {
                source_hash: m1.clone(),
                target_hash: m2.clone(),
                relationship_type: RelationshipType::Related,
                similarity: 0.9,
                connection_types: vec![],
            })
            .unwrap();
        graph
            .store_association(&Edge {
                source_hash: m2.clone(),
                target_hash: m3.clone(),
                relationship_type: RelationshipType::Related,
                similarity: 0.6,
                connection_types: vec![],
            })
            .unwrap();

        let hops = graph.find_connected(&m1, None, Direction::Both, 2).unwrap();
        assert_eq!(hops.len(), 2);
        assert_eq!(hops[0].hash, m2);
        assert_eq!(hops[0].depth, 1);
        assert_eq!(hops[1].hash, m3);
        assert_eq!(hops[1].depth, 2);
    }

    #[test]
    fn shortest_path_finds_minimal_hop_route() {
        let local = local_store();
        let m1 = store_with(&local, "path start");
        let m2 = store_with(&local, "path middle");
        let m3 = store_with(&local, "path end");
        let graph = GraphStore::new(Arc::clone(&local));

        graph
            .store_association(&Edge {
                source_hash: m1.clone(),
                target_hash: m2.clone(),
                relationship_type: RelationshipType::Related,
                similarity: 0.7,
                connection_types: vec![],
            })
            .unwrap();
        graph
            .store_association(&Edge {
                source_hash: m2.clone(),
                target_hash: m3.clone(),
                relationship_type: RelationshipType::Related,
                similarity: 0.7,
                connection_types: vec![],
            })
            .unwrap();

        let path = graph.shortest_path(&m1, &m3, 5).unwrap().unwrap();
        assert_eq!(path, vec![m1, m2, m3]);
    }

    #[test]
    fn shortest_path_picks_max_similarity_among_same_depth_ties() {
        let local = local_store();
        let start = store_with(&local, "start memory");
        let weak_sibling = store_with(&local, "weak sibling");
        let strong_sibling = store_with(&local, "strong sibling");
        let target = store_with(&local, "target memory");
        let graph = GraphStore::new(Arc::clone(&local));

        // Both siblings reach `target` in exactly 2 hops; the one routed
        // through `strong_sibling` has the higher aggregate similarity
        // and must win regardless of insertion/processing order.
        graph
            .store_association(&Edge {
                source_hash: start.clone(),
                target_hash: weak_sibling.clone(),
                relationship_type: RelationshipType::Related,
                similarity: 0.2,
                connection_types: vec![],
            })
            .unwrap();
        graph
            .store_association(&Edge {
                source_hash: weak_sibling.clone(),
                target_hash: target.clone(),
                relationship_type: RelationshipType::Related,
                similarity: 0.2,
                connection_types: vec![],
            })
            .unwrap();
        graph
            .store_association(&Edge {
                source_hash: start.clone(),
                target_hash: strong_sibling.clone(),
                relationship_type: RelationshipType::Related,
                similarity: 0.9,
                connection_types: vec![],
            })
            .unwrap();
        graph
            .store_association(&Edge {
                source_hash: strong_sibling.clone(),
                target_hash: target.clone(),
                relationship_type: RelationshipType::Related,
                similarity: 0.9,
                connection_types: vec![],
            })
            .unwrap();

        let path = graph.shortest_path(&start, &target, 5).unwrap().unwrap();
        assert_eq!(path, vec![start, strong_sibling, target]);
    }

    #[test]
    fn shortest_path_returns_none_when_unreachable() {
        let local = local_store();
        let m1 = store_with(&local, "island one");
        let m2 = store_with(&local, "island two");
        let graph = GraphStore::new(local);
        assert!(graph.shortest_path(&m1, &m2, 5).unwrap().is_none());
    }

    #[test]
    fn subgraph_includes_origin_plus_reachable() {
        let local = local_store();
        let m1 = store_with(&local, "center memory");
        let m2 = store_with(&local, "edge memory");
        let graph = GraphStore::new(Arc::clone(&local));
        graph
            .store_association(&Edge {
                source_hash: m1.clone(),
                target_hash: m2.clone(),
                relationship_type: RelationshipType::Related,
                similarity: 0.4,
                connection_types: vec![],
            })
            .unwrap();

        let sub = graph.subgraph(&m1, 2).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub[0].hash, m1);
    }
}
