//! Weighted choice among eligible rules
//!
//! Rules with higher weights are drawn more often. A weight of zero keeps a
//! rule out of the draw unless every candidate weighs zero, in which case the
//! choice falls back to uniform.

use rand::{Rng, RngCore};

/// Weights of one draw, in candidate order
#[derive(Debug, Clone)]
pub struct WeightedIndex {
    weights: Vec<u32>,
    total_weight: u64,
}

impl WeightedIndex {
    pub fn new(weights: Vec<u32>) -> Self {
        let total_weight = weights.iter().map(|&w| u64::from(w)).sum();
        Self { weights, total_weight }
    }

    /// Draw a candidate index with probability proportional to its weight
    ///
    /// Returns `None` only when there are no candidates.
    pub fn sample(&self, rng: &mut dyn RngCore) -> Option<usize> {
        if self.weights.is_empty() {
            return None;
        }

        if self.total_weight == 0 {
            // If all weights are 0, use uniform distribution
            return Some(rng.gen_range(0..self.weights.len()));
        }

        let mut roll = rng.gen_range(0..self.total_weight);
        for (idx, &weight) in self.weights.iter().enumerate() {
            let weight = u64::from(weight);
            if roll < weight {
                return Some(idx);
            }
            roll -= weight;
        }

        // roll < total_weight guarantees an earlier return
        Some(self.weights.len() - 1)
    }
}
