//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy regression trees on squared error. Candidate thresholds are
//! midpoints between consecutive distinct feature values; ties in gain are
//! resolved by [`SplitTieBreaker`] so the same sample set always yields the
//! same tree.

use calorie_ml_core::forest::{Node, Tree};

use crate::deterministic::SplitTieBreaker;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    /// Nodes with fewer samples become leaves
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 1,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: f64, gain: f64) -> Self {
        Self {
            feature_idx,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold),
        }
    }

    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// Build a regression tree over a (possibly repeated) sample of rows.
pub struct CartBuilder<'a, R: AsRef<[f64]>> {
    config: TreeConfig,
    rows: &'a [R],
    targets: &'a [f64],
    feature_count: usize,
}

impl<'a, R: AsRef<[f64]>> CartBuilder<'a, R> {
    pub fn new(rows: &'a [R], targets: &'a [f64], config: TreeConfig) -> Self {
        assert_eq!(rows.len(), targets.len());

        let feature_count = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);

        Self {
            config,
            rows,
            targets,
            feature_count,
        }
    }

    /// Build a tree from the given sample indices (duplicates allowed).
    pub fn build(&self, sample: &[usize]) -> Tree {
        let mut nodes = Vec::new();
        let mut indices = sample.to_vec();
        self.build_node(&mut indices, 0, &mut nodes);
        Tree { nodes }
    }

    /// Build from every row once.
    #[cfg(test)]
    pub fn build_all(&self) -> Tree {
        let sample: Vec<usize> = (0..self.rows.len()).collect();
        self.build(&sample)
    }

    /// Recursively build tree nodes
    fn build_node(&self, indices: &mut [usize], depth: usize, nodes: &mut Vec<Node>) -> u32 {
        let current_idx = nodes.len() as u32;
        let leaf_value = self.mean_target(indices);

        if indices.is_empty()
            || depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || indices.len() < 2 * self.config.min_samples_leaf
            || self.is_pure(indices)
        {
            nodes.push(Node::leaf(leaf_value));
            return current_idx;
        }

        let split = match self.find_best_split(indices) {
            Some(s) => s,
            None => {
                nodes.push(Node::leaf(leaf_value));
                return current_idx;
            }
        };

        // Stable partition, left keeps samples with value <= threshold
        let (mut left, mut right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.value(i, split.feature_idx) <= split.threshold);

        nodes.push(Node::split(split.feature_idx as u16, split.threshold));

        let left_idx = self.build_node(&mut left, depth + 1, nodes);
        let right_idx = self.build_node(&mut right, depth + 1, nodes);

        nodes[current_idx as usize].left = left_idx;
        nodes[current_idx as usize].right = right_idx;

        current_idx
    }

    /// Exact-greedy search over every feature and midpoint threshold.
    fn find_best_split(&self, indices: &mut [usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let total: f64 = indices.iter().map(|&i| self.targets[i]).sum();
        let parent_score = total * total / n as f64;

        let mut best: Option<SplitCandidate> = None;

        for feature_idx in 0..self.feature_count {
            indices.sort_by(|&a, &b| {
                self.value(a, feature_idx)
                    .total_cmp(&self.value(b, feature_idx))
                    .then(a.cmp(&b))
            });

            let mut left_sum = 0.0;
            for pos in 1..n {
                left_sum += self.targets[indices[pos - 1]];

                let lo = self.value(indices[pos - 1], feature_idx);
                let hi = self.value(indices[pos], feature_idx);
                if lo >= hi || pos < min_leaf || n - pos < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                // Reduction in SSE up to a constant: S_l²/n_l + S_r²/n_r - S²/n
                let gain = left_sum * left_sum / pos as f64
                    + right_sum * right_sum / (n - pos) as f64
                    - parent_score;
                if gain <= 0.0 {
                    continue;
                }

                let candidate = SplitCandidate::new(feature_idx, midpoint(lo, hi), gain);
                if best.as_ref().map_or(true, |current| candidate.beats(current)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn value(&self, row: usize, feature_idx: usize) -> f64 {
        self.rows[row].as_ref()[feature_idx]
    }

    fn mean_target(&self, indices: &[usize]) -> f64 {
        if indices.is_empty() {
            return 0.0;
        }
        indices.iter().map(|&i| self.targets[i]).sum::<f64>() / indices.len() as f64
    }

    fn is_pure(&self, indices: &[usize]) -> bool {
        let Some(&head) = indices.first() else {
            return true;
        };
        let first = self.targets[head];
        indices.iter().all(|&i| self.targets[i] == first)
    }
}

/// Threshold between two adjacent distinct values that still separates them.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi {
        lo
    } else {
        mid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_tree() {
        let rows = vec![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 10.0]];
        let targets = vec![1.0, 1.0, 5.0, 5.0];

        let config = TreeConfig {
            max_depth: 2,
            min_samples_split: 2,
            min_samples_leaf: 1,
        };

        let tree = CartBuilder::new(&rows, &targets, config).build_all();

        assert_eq!(tree.nodes[0].feature_index, 0);
        assert_eq!(tree.nodes[0].threshold, 2.5);
        assert_eq!(tree.evaluate(&[1.5, 10.0]), 1.0);
        assert_eq!(tree.evaluate(&[3.5, 10.0]), 5.0);
        // Both children are pure, so the tree stops at depth 1
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_leaf_only_tree() {
        let rows = vec![[100.0]];
        let targets = vec![7.0];

        let tree = CartBuilder::new(&rows, &targets, TreeConfig::default()).build_all();

        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].value, Some(7.0));
    }

    #[test]
    fn test_empty_sample_yields_leaf() {
        let rows = vec![[1.0], [2.0]];
        let targets = vec![3.0, 4.0];
        let config = TreeConfig {
            max_depth: 4,
            min_samples_split: 0,
            min_samples_leaf: 0,
        };

        let tree = CartBuilder::new(&rows, &targets, config).build(&[]);
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].value, Some(0.0));
        assert_eq!(tree.evaluate(&[1.5]), 0.0);
    }

    #[test]
    fn test_min_samples_split_blocks_split() {
        let rows = vec![[1.0], [2.0], [3.0], [4.0]];
        let targets = vec![0.0, 0.0, 10.0, 10.0];
        let config = TreeConfig {
            max_depth: 5,
            min_samples_split: 5,
            min_samples_leaf: 1,
        };

        let tree = CartBuilder::new(&rows, &targets, config).build_all();
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].value, Some(5.0));
    }

    #[test]
    fn test_max_depth_respected() {
        let rows: Vec<[f64; 1]> = (0..64).map(|i| [i as f64]).collect();
        let targets: Vec<f64> = (0..64).map(|i| (i * i) as f64).collect();
        let config = TreeConfig {
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
        };

        let tree = CartBuilder::new(&rows, &targets, config).build_all();
        assert_eq!(tree.depth(), 3);
        assert!(tree.leaf_count() <= 8);
    }

    #[test]
    fn test_tie_prefers_lower_feature() {
        // Both features separate the targets identically
        let rows = vec![[1.0, 1.0], [2.0, 2.0]];
        let targets = vec![0.0, 4.0];
        let config = TreeConfig {
            max_depth: 1,
            min_samples_split: 2,
            min_samples_leaf: 1,
        };

        let tree = CartBuilder::new(&rows, &targets, config).build_all();
        assert_eq!(tree.nodes[0].feature_index, 0);
    }

    #[test]
    fn test_duplicate_samples() {
        let rows = vec![[1.0], [2.0]];
        let targets = vec![0.0, 6.0];
        let config = TreeConfig {
            max_depth: 1,
            min_samples_split: 2,
            min_samples_leaf: 1,
        };

        // Row 0 drawn three times, row 1 once
        let tree = CartBuilder::new(&rows, &targets, config.clone()).build(&[0, 0, 0, 1]);
        assert_eq!(tree.evaluate(&[1.0]), 0.0);
        assert_eq!(tree.evaluate(&[2.0]), 6.0);

        let degenerate = CartBuilder::new(&rows, &targets, config).build(&[1, 1, 1]);
        assert_eq!(degenerate.nodes.len(), 1);
        assert_eq!(degenerate.nodes[0].value, Some(6.0));
    }

    #[test]
    fn test_midpoint_adjacent_floats() {
        let lo = 1.0f64;
        let hi = f64::from_bits(lo.to_bits() + 1);
        let t = midpoint(lo, hi);
        assert!(lo <= t && t < hi);
    }
}
