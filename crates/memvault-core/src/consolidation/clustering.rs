//! DBSCAN-like clustering over cached embeddings
//!
//! Naive O(n²) neighbor scan — adequate at the per-run bounded window
//! sizes consolidation operates on. No new dependency: cosine distance is
//! already available from `embeddings`.

use crate::embeddings::cosine_similarity;

/// A discovered cluster: member content hashes and a unit-norm centroid.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub members: Vec<String>,
    pub centroid: Vec<f32>,
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

fn centroid_of(embeddings: &[&Vec<f32>]) -> Vec<f32> {
    let dim = embeddings.first().map(|e| e.len()).unwrap_or(0);
    let mut sum = vec![0.0_f32; dim];
    for embedding in embeddings {
        for (s, v) in sum.iter_mut().zip(embedding.iter()) {
            *s += v;
        }
    }
    let mut centroid: Vec<f32> = sum.iter().map(|s| s / embeddings.len() as f32).collect();
    crate::embeddings::normalize(&mut centroid);
    centroid
}

/// Cluster `items` (content_hash, embedding) pairs by cosine distance.
/// Points whose neighborhood is smaller than `min_points` are left as
/// noise and excluded from the result.
pub fn cluster_embeddings(items: &[(String, Vec<f32>)], eps: f32, min_points: usize) -> Vec<Cluster> {
    let n = items.len();
    let mut visited = vec![false; n];
    let mut clusters = Vec::new();

    let neighbors_of = |idx: usize| -> Vec<usize> {
        (0..n)
            .filter(|&j| j != idx && cosine_distance(&items[idx].1, &items[j].1) <= eps)
            .collect()
    };

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let neighbors = neighbors_of(i);
        if neighbors.len() + 1 < min_points {
            continue;
        }

        let mut member_indices = vec![i];
        let mut frontier = neighbors;
        while let Some(j) = frontier.pop() {
            if visited[j] {
                if !member_indices.contains(&j) {
                    member_indices.push(j);
                }
                continue;
            }
            visited[j] = true;
            member_indices.push(j);
            let j_neighbors = neighbors_of(j);
            if j_neighbors.len() + 1 >= min_points {
                frontier.extend(j_neighbors);
            }
        }

        let members: Vec<String> = member_indices.iter().map(|&idx| items[idx].0.clone()).collect();
        let embeddings: Vec<&Vec<f32>> = member_indices.iter().map(|&idx| &items[idx].1).collect();
        clusters.push(Cluster {
            centroid: centroid_of(&embeddings),
            members,
        });
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn groups_near_identical_vectors() {
        let items = vec![
            ("a".to_string(), unit(4, 0)),
            ("b".to_string(), unit(4, 0)),
            ("c".to_string(), unit(4, 0)),
            ("d".to_string(), unit(4, 2)),
        ];
        let clusters = cluster_embeddings(&items, 0.05, 2);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 3);
    }

    #[test]
    fn isolated_points_are_left_as_noise() {
        let items = vec![
            ("a".to_string(), unit(4, 0)),
            ("b".to_string(), unit(4, 1)),
            ("c".to_string(), unit(4, 2)),
        ];
        let clusters = cluster_embeddings(&items, 0.01, 2);
        assert!(clusters.is_empty());
    }

    #[test]
    fn centroid_is_unit_norm() {
        let items = vec![("a".to_string(), unit(4, 0)), ("b".to_string(), unit(4, 0))];
        let clusters = cluster_embeddings(&items, 0.05, 2);
        let norm: f32 = clusters[0].centroid.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
