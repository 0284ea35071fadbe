//! Reciprocal Rank Fusion (RRF) for combining ranked lists
//!
//! RRF only looks at ranks, so lists with incomparable score scales (cosine
//! similarity, BM25) can be merged without normalisation.

use opensynthesis_common::models::{RetrievalMethod, ScoredChunk};
use std::cmp::Ordering;
use std::collections::HashMap;

/// RRF fusion parameters
#[derive(Debug, Clone)]
pub struct RRFusion {
    /// Rank constant K (typically 60)
    pub k: f64,

    /// Per-list weights; lists beyond the given weights count 1.0
    pub weights: Vec<f64>,
}

impl Default for RRFusion {
    fn default() -> Self {
        Self {
            k: 60.0,
            weights: Vec::new(),
        }
    }
}

impl RRFusion {
    /// Create with per-list weights
    pub fn with_weights(weights: Vec<f64>) -> Self {
        Self {
            weights,
            ..Self::default()
        }
    }

    pub fn with_k(mut self, k: f64) -> Self {
        self.k = k;
        self
    }

    fn weight(&self, list: usize) -> f64 {
        self.weights.get(list).copied().unwrap_or(1.0)
    }

    /// Fuse ranked lists into at most `limit` chunks, best first.
    ///
    /// Each 1-indexed rank `r` adds `weight / (k + r)` to the chunk's score.
    /// The chunk body kept is the one from the first list the id appears in.
    /// Equal scores keep first-encounter order.
    pub fn fuse(&self, lists: &[Vec<ScoredChunk>], limit: usize) -> Vec<ScoredChunk> {
        let mut order: Vec<(ScoredChunk, f64)> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for (list_idx, list) in lists.iter().enumerate() {
            let weight = self.weight(list_idx);
            for (rank, item) in list.iter().enumerate() {
                let contribution = weight / (self.k + (rank + 1) as f64);
                match positions.get(item.id()) {
                    Some(&pos) => order[pos].1 += contribution,
                    None => {
                        positions.insert(item.id(), order.len());
                        order.push((item.clone(), contribution));
                    }
                }
            }
        }

        // Vec::sort_by is stable
        order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        order.truncate(limit);

        order
            .into_iter()
            .map(|(item, score)| ScoredChunk::new(item.chunk, score, RetrievalMethod::Hybrid))
            .collect()
    }
}
