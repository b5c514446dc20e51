//! Undirected pair graph over image indices with per-edge match information.

use std::collections::HashMap;

use pano_core::Result;
use pano_features::MatchInfo;

/// Adjacency lists plus a sparse table of pairwise homographies. An edge
/// `(a, b)` is always stored in both directions: `(b, a)` carries the inverse
/// homography and the same inlier count and confidence.
pub struct PairGraph {
    neighbors: Vec<Vec<usize>>,
    pairwise: Vec<HashMap<usize, MatchInfo>>,
}

impl PairGraph {
    pub fn new(n: usize) -> Self {
        Self {
            neighbors: vec![Vec::new(); n],
            pairwise: vec![HashMap::new(); n],
        }
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn add_pair(&mut self, a: usize, b: usize, info: MatchInfo) -> Result<()> {
        let reverse = MatchInfo {
            homo: info.homo.inverse()?,
            confidence: info.confidence,
            num_inliers: info.num_inliers,
        };
        self.neighbors[a].push(b);
        self.neighbors[b].push(a);
        self.pairwise[a].insert(b, info);
        self.pairwise[b].insert(a, reverse);
        Ok(())
    }

    pub fn get(&self, a: usize, b: usize) -> Option<&MatchInfo> {
        self.pairwise[a].get(&b)
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.pairwise[a].contains_key(&b)
    }

    pub fn neighbors(&self, a: usize) -> &[usize] {
        &self.neighbors[a]
    }

    /// Every adjacency entry has its mirror, and every stored pair has its
    /// reverse pair.
    pub fn is_symmetric(&self) -> bool {
        for (a, ns) in self.neighbors.iter().enumerate() {
            for &b in ns {
                if !self.neighbors[b].contains(&a) {
                    return false;
                }
                if !self.pairwise[a].contains_key(&b) || !self.pairwise[b].contains_key(&a) {
                    return false;
                }
            }
        }
        true
    }
}
