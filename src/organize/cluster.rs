//! Single-link clustering over pairwise cosine similarity.
//!
//! Every pair of vectors at or above the threshold is linked, and the
//! connected components of that graph are the candidate clusters. Union
//! semantics mean a vector close to two groups merges them, so the
//! result is always a partition.

use tracing::debug;

use crate::config::ClusteringConfig;
use crate::text::SparseVector;

/// A group of mutually reachable messages.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Cluster {
    /// Indices into the input vectors, ascending.
    pub members: Vec<usize>,
    /// `members.len()` as a fraction of all eligible vectors.
    pub fraction: f64,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Disjoint-set forest with path compression and union by size.
#[derive(Debug)]
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = i;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }
}

/// Group `vectors` into clusters.
///
/// Components smaller than `min_cluster_size`, or smaller than
/// `min_cluster_fraction` of all vectors, are dropped; their members stay
/// unclustered. Clusters are ordered by their smallest member.
pub fn cluster(vectors: &[SparseVector], config: &ClusteringConfig) -> Vec<Cluster> {
    let n = vectors.len();
    if n == 0 {
        return Vec::new();
    }

    let mut uf = UnionFind::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if vectors[i].cosine(&vectors[j]) >= config.similarity_threshold {
                uf.union(i, j);
            }
        }
    }

    // Indices are visited in ascending order, so each component's members
    // are sorted and components appear in order of their first member.
    let mut root_slot: Vec<Option<usize>> = vec![None; n];
    let mut components: Vec<Vec<usize>> = Vec::new();
    for i in 0..n {
        let root = uf.find(i);
        match root_slot[root] {
            Some(slot) => components[slot].push(i),
            None => {
                root_slot[root] = Some(components.len());
                components.push(vec![i]);
            }
        }
    }

    let total = n as f64;
    let clusters: Vec<Cluster> = components
        .into_iter()
        .filter(|members| {
            members.len() >= config.min_cluster_size
                && members.len() as f64 / total >= config.min_cluster_fraction
        })
        .map(|members| Cluster {
            fraction: members.len() as f64 / total,
            members,
        })
        .collect();

    debug!(
        eligible = n,
        clusters = clusters.len(),
        clustered = clusters.iter().map(Cluster::size).sum::<usize>(),
        "Clustering complete"
    );
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(pairs: &[(usize, f64)]) -> SparseVector {
        SparseVector::from_pairs(pairs.to_vec()).normalized()
    }

    fn cfg(threshold: f64, min_size: usize, min_fraction: f64) -> ClusteringConfig {
        ClusteringConfig {
            similarity_threshold: threshold,
            min_cluster_size: min_size,
            min_cluster_fraction: min_fraction,
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster(&[], &ClusteringConfig::default()).is_empty());
    }

    #[test]
    fn test_transitive_chain_merges() {
        // 0~1 and 1~2 are linked, 0 and 2 are not directly similar.
        let vs = vec![
            v(&[(0, 1.0), (1, 1.0)]),
            v(&[(1, 1.0), (2, 1.0)]),
            v(&[(2, 1.0), (3, 1.0)]),
            v(&[(9, 1.0)]),
        ];
        assert!(vs[0].cosine(&vs[2]) < 0.25);
        let out = cluster(&vs, &cfg(0.4, 2, 0.0));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].members, vec![0, 1, 2]);
        assert_eq!(out[0].fraction, 0.75);
    }

    #[test]
    fn test_small_components_dropped() {
        let vs = vec![
            v(&[(0, 1.0)]),
            v(&[(0, 1.0)]),
            v(&[(1, 1.0)]),
            v(&[(1, 1.0)]),
            v(&[(1, 1.0)]),
        ];
        let by_size = cluster(&vs, &cfg(0.5, 3, 0.0));
        assert_eq!(by_size.len(), 1);
        assert_eq!(by_size[0].members, vec![2, 3, 4]);

        let by_fraction = cluster(&vs, &cfg(0.5, 2, 0.5));
        assert_eq!(by_fraction.len(), 1);
        assert_eq!(by_fraction[0].members, vec![2, 3, 4]);
    }

    #[test]
    fn test_clusters_ordered_by_first_member() {
        let vs = vec![
            v(&[(5, 1.0)]),
            v(&[(1, 1.0)]),
            v(&[(5, 1.0)]),
            v(&[(1, 1.0)]),
        ];
        let out = cluster(&vs, &cfg(0.5, 2, 0.0));
        assert_eq!(out[0].members, vec![0, 2]);
        assert_eq!(out[1].members, vec![1, 3]);
    }

    #[test]
    fn test_clusters_are_disjoint() {
        let vs: Vec<SparseVector> = (0..12).map(|i| v(&[(i % 3, 1.0), (7, 0.2)])).collect();
        let out = cluster(&vs, &cfg(0.9, 2, 0.0));
        let mut seen = std::collections::HashSet::new();
        for c in &out {
            for &m in &c.members {
                assert!(seen.insert(m), "member {m} in two clusters");
            }
        }
    }

    fn partition(vectors: &[SparseVector], order: &[usize], config: &ClusteringConfig) -> Vec<Vec<usize>> {
        let permuted: Vec<SparseVector> = order.iter().map(|&i| vectors[i].clone()).collect();
        let mut groups: Vec<Vec<usize>> = cluster(&permuted, config)
            .into_iter()
            .map(|c| {
                let mut g: Vec<usize> = c.members.into_iter().map(|m| order[m]).collect();
                g.sort_unstable();
                g
            })
            .collect();
        groups.sort();
        groups
    }

    proptest! {
        #[test]
        fn prop_membership_is_order_independent(
            raw in prop::collection::vec(prop::collection::vec((0usize..6, 0.1f64..1.0), 1..4), 2..14),
            seed in any::<u64>(),
        ) {
            let vectors: Vec<SparseVector> = raw.iter().map(|p| v(p)).collect();
            let config = cfg(0.5, 2, 0.1);

            let identity: Vec<usize> = (0..vectors.len()).collect();
            let mut shuffled = identity.clone();
            // Deterministic Fisher-Yates driven by the seed.
            let mut state = seed | 1;
            for i in (1..shuffled.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let j = (state % (i as u64 + 1)) as usize;
                shuffled.swap(i, j);
            }

            prop_assert_eq!(
                partition(&vectors, &identity, &config),
                partition(&vectors, &shuffled, &config)
            );
        }

        #[test]
        fn prop_repeat_runs_identical(
            raw in prop::collection::vec(prop::collection::vec((0usize..6, 0.1f64..1.0), 1..4), 0..14),
        ) {
            let vectors: Vec<SparseVector> = raw.iter().map(|p| v(p)).collect();
            let config = ClusteringConfig::default();
            prop_assert_eq!(cluster(&vectors, &config), cluster(&vectors, &config));
        }
    }
}
