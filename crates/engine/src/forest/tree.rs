//! CART decision tree classifier
//!
//! Array-based node storage with preorder layout: a split node's children
//! always sit at higher indices than the node itself. Splits minimize
//! weighted Gini impurity over a random subset of features.

use super::Classifier;
use crate::models::{ClassProbabilities, IrrigationClass, NUM_FEATURES};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Smallest impurity decrease that counts as a useful split
const MIN_IMPURITY_DECREASE: f64 = 1e-12;

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: usize,
}

/// A node in the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Samples with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Fraction of positive training samples that reached this leaf
    Leaf { probability: f64 },
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }
}

/// A fitted decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    /// Unnormalized impurity decrease accumulated per feature
    impurity_decrease: [f64; NUM_FEATURES],
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Position in the sorted index list where the right child starts
    position: usize,
    child_impurity: f64,
}

struct TreeBuilder<'a, R: Rng> {
    x: &'a [[f64; NUM_FEATURES]],
    positive: &'a [bool],
    params: TreeParams,
    rng: &'a mut R,
    nodes: Vec<TreeNode>,
    impurity_decrease: [f64; NUM_FEATURES],
}

fn gini(n: usize, positives: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

impl<'a, R: Rng> TreeBuilder<'a, R> {
    fn build(&mut self, mut indices: Vec<usize>, depth: usize) -> usize {
        let n = indices.len();
        let positives = indices.iter().filter(|&&i| self.positive[i]).count();
        let node_index = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            probability: if n == 0 { 0.0 } else { positives as f64 / n as f64 },
        });

        let pure = positives == 0 || positives == n;
        if pure
            || depth >= self.params.max_depth
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
        {
            return node_index;
        }

        let parent_impurity = n as f64 * gini(n, positives);
        let split = match self.find_split(&mut indices, positives) {
            Some(s) if parent_impurity - s.child_impurity > MIN_IMPURITY_DECREASE => s,
            _ => return node_index,
        };

        self.impurity_decrease[split.feature] += parent_impurity - split.child_impurity;

        self.sort_by_feature(&mut indices, split.feature);
        let right_indices = indices.split_off(split.position);
        let left = self.build(indices, depth + 1);
        let right = self.build(right_indices, depth + 1);

        self.nodes[node_index] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_index
    }

    /// Try the sampled features first; fall back to the rest only if none
    /// of them produced a valid split.
    fn find_split(&mut self, indices: &mut [usize], positives: usize) -> Option<SplitCandidate> {
        let mut features: [usize; NUM_FEATURES] = [0, 1, 2, 3];
        features.shuffle(&mut *self.rng);

        let mut best: Option<SplitCandidate> = None;
        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.params.max_features && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_split_on(indices, feature, positives) {
                if best.map_or(true, |b| candidate.child_impurity < b.child_impurity) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn sort_by_feature(&self, indices: &mut [usize], feature: usize) {
        let x = self.x;
        indices.sort_by(|&a, &b| {
            x[a][feature]
                .partial_cmp(&x[b][feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    fn best_split_on(
        &self,
        indices: &mut [usize],
        feature: usize,
        positives: usize,
    ) -> Option<SplitCandidate> {
        self.sort_by_feature(indices, feature);
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;

        let mut best: Option<SplitCandidate> = None;
        let mut left_pos = 0usize;
        for k in 0..n - 1 {
            if self.positive[indices[k]] {
                left_pos += 1;
            }
            let left_n = k + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            let current = self.x[indices[k]][feature];
            let next = self.x[indices[k + 1]][feature];
            if current >= next {
                continue;
            }
            let child_impurity = left_n as f64 * gini(left_n, left_pos)
                + right_n as f64 * gini(right_n, positives - left_pos);
            if best.map_or(true, |b| child_impurity < b.child_impurity) {
                let mut threshold = current + (next - current) / 2.0;
                if threshold >= next {
                    threshold = current;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    position: left_n,
                    child_impurity,
                });
            }
        }
        best
    }
}

impl DecisionTree {
    /// Fit a tree on the rows selected by `indices` (duplicates allowed, as
    /// produced by bootstrap resampling).
    pub fn fit<R: Rng>(
        x: &[[f64; NUM_FEATURES]],
        y: &[IrrigationClass],
        indices: Vec<usize>,
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let positive: Vec<bool> = y.iter().map(|c| *c == IrrigationClass::Irrigate).collect();
        let mut builder = TreeBuilder {
            x,
            positive: &positive,
            params,
            rng,
            nodes: Vec::new(),
            impurity_decrease: [0.0; NUM_FEATURES],
        };
        builder.build(indices, 0);
        Self {
            nodes: builder.nodes,
            impurity_decrease: builder.impurity_decrease,
        }
    }

    /// Check node references of a deserialized tree
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        if self
            .impurity_decrease
            .iter()
            .any(|d| !(d.is_finite() && *d >= 0.0))
        {
            return Err(format!(
                "impurity decrease {:?} must be finite and non-negative",
                self.impurity_decrease
            ));
        }
        let n = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= NUM_FEATURES {
                        return Err(format!("node {} splits on unknown feature {}", i, feature));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has a non-finite threshold", i));
                    }
                    if *left <= i || *right <= i || *left >= n || *right >= n {
                        return Err(format!("node {} has invalid children", i));
                    }
                }
                TreeNode::Leaf { probability } => {
                    if !(0.0..=1.0).contains(probability) {
                        return Err(format!("leaf {} probability {} out of range", i, probability));
                    }
                }
            }
        }
        Ok(())
    }

    fn leaf_probability(&self, x: &[f64; NUM_FEATURES]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { probability } => return *probability,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Longest root-to-leaf path
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        self.node_depth(0)
    }

    fn node_depth(&self, idx: usize) -> usize {
        match &self.nodes[idx] {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => {
                1 + self.node_depth(*left).max(self.node_depth(*right))
            }
        }
    }

    pub fn node_at(&self, index: usize) -> &TreeNode {
        &self.nodes[index]
    }

    /// Raw impurity decrease per feature (unnormalized)
    pub fn impurity_decrease(&self) -> &[f64; NUM_FEATURES] {
        &self.impurity_decrease
    }
}

impl Classifier for DecisionTree {
    fn predict(&self, x: &[f64; NUM_FEATURES]) -> IrrigationClass {
        if self.leaf_probability(x) > 0.5 {
            IrrigationClass::Irrigate
        } else {
            IrrigationClass::NoIrrigation
        }
    }

    fn predict_proba(&self, x: &[f64; NUM_FEATURES]) -> ClassProbabilities {
        ClassProbabilities::from_positive(self.leaf_probability(x))
    }

    /// Impurity decrease normalized to sum to 1; all zeros for a stump
    fn importance(&self) -> [f64; NUM_FEATURES] {
        let total: f64 = self.impurity_decrease.iter().sum();
        if total <= 0.0 {
            return [0.0; NUM_FEATURES];
        }
        self.impurity_decrease.map(|v| v / total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params() -> TreeParams {
        TreeParams {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: NUM_FEATURES,
        }
    }

    /// Label depends only on feature 0: x0 > 5 → irrigate
    fn threshold_data() -> (Vec<[f64; NUM_FEATURES]>, Vec<IrrigationClass>) {
        let x: Vec<[f64; NUM_FEATURES]> = (0..10)
            .map(|i| [i as f64, (i % 3) as f64, 1.0, (10 - i) as f64 * 0.5])
            .collect();
        let y = x
            .iter()
            .map(|r| {
                if r[0] > 5.0 {
                    IrrigationClass::Irrigate
                } else {
                    IrrigationClass::NoIrrigation
                }
            })
            .collect();
        (x, y)
    }

    #[test]
    fn test_learns_single_threshold() {
        let (x, y) = threshold_data();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &y, (0..x.len()).collect(), params(), &mut rng);

        for (row, label) in x.iter().zip(&y) {
            assert_eq!(tree.predict(row), *label);
        }
        assert!(tree.validate().is_ok());
        assert!(tree.n_leaves() >= 2);
    }

    #[test]
    fn test_pure_node_is_single_leaf() {
        let x = vec![[1.0, 2.0, 3.0, 4.0], [2.0, 3.0, 4.0, 5.0]];
        let y = vec![IrrigationClass::Irrigate, IrrigationClass::Irrigate];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &y, vec![0, 1], params(), &mut rng);

        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.importance(), [0.0; NUM_FEATURES]);
        assert_eq!(tree.predict_proba(&[0.0; NUM_FEATURES]).irrigate, 1.0);
    }

    #[test]
    fn test_max_depth_respected() {
        let x: Vec<[f64; NUM_FEATURES]> = (0..64).map(|i| [i as f64, 0.0, 0.0, 0.0]).collect();
        // Alternating labels force deep trees
        let y: Vec<IrrigationClass> = (0..64)
            .map(|i| IrrigationClass::from_label((i % 2) as u8))
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let limited = TreeParams {
            max_depth: 3,
            ..params()
        };
        let tree = DecisionTree::fit(&x, &y, (0..64).collect(), limited, &mut rng);
        assert!(tree.depth() <= 3, "depth {}", tree.depth());
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let (x, y) = threshold_data();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let p = TreeParams {
            min_samples_leaf: 4,
            min_samples_split: 8,
            ..params()
        };
        let tree = DecisionTree::fit(&x, &y, (0..x.len()).collect(), p, &mut rng);
        // 10 samples with at least 4 per leaf allow at most 2 leaves
        assert!(tree.n_leaves() <= 2);
    }

    #[test]
    fn test_importance_concentrates_on_informative_feature() {
        let (x, y) = threshold_data();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let tree = DecisionTree::fit(&x, &y, (0..x.len()).collect(), params(), &mut rng);
        let importance = tree.importance();
        assert!((importance.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        // Feature 2 is constant and can never be split on
        assert_eq!(importance[2], 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_children() {
        let tree = DecisionTree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 5,
            }],
            impurity_decrease: [0.0; NUM_FEATURES],
        };
        assert!(tree.validate().is_err());

        let empty = DecisionTree {
            nodes: Vec::new(),
            impurity_decrease: [0.0; NUM_FEATURES],
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_impurity_decrease() {
        let (x, y) = threshold_data();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut tree = DecisionTree::fit(&x, &y, (0..x.len()).collect(), params(), &mut rng);
        assert!(tree.validate().is_ok());

        tree.impurity_decrease = [3.0, -2.0, 0.0, 0.0];
        assert!(tree.validate().is_err());

        tree.impurity_decrease = [f64::NAN, 0.0, 0.0, 0.0];
        assert!(tree.validate().is_err());
    }
}
