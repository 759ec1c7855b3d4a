//! Random forest with bootstrap aggregation
//!
//! Each tree is fitted on its own bootstrap resample with an independent RNG
//! stream derived from the forest seed, so a forest is reproducible. The
//! forest value only exists once every tree has been fitted.

use super::tree::{DecisionTree, TreeParams};
use super::Classifier;
use crate::error::{EngineError, Result};
use crate::models::{ClassProbabilities, IrrigationClass, NUM_FEATURES};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hyperparameters for the forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the ensemble
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples a node needs to be split
    pub min_samples_split: usize,
    /// Minimum samples in each leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (`None` = round(sqrt(n_features)))
    pub max_features: Option<usize>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: None,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(EngineError::InvalidConfig("n_trees must be at least 1".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(EngineError::InvalidConfig(
                "min_samples_leaf must be at least 1".into(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(EngineError::InvalidConfig(
                "min_samples_split must be at least 2".into(),
            ));
        }
        if let Some(m) = self.max_features {
            if m == 0 || m > NUM_FEATURES {
                return Err(EngineError::InvalidConfig(format!(
                    "max_features must be in 1..={}, got {}",
                    NUM_FEATURES, m
                )));
            }
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self
                .max_features
                .unwrap_or_else(|| ((NUM_FEATURES as f64).sqrt().round() as usize).max(1)),
        }
    }
}

/// A fitted random forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit `config.n_trees` trees on bootstrap resamples of `(x, y)`
    pub fn fit(
        x: &[[f64; NUM_FEATURES]],
        y: &[IrrigationClass],
        config: &ForestConfig,
        seed: u64,
    ) -> Result<Self> {
        config.validate()?;
        if x.is_empty() || x.len() != y.len() {
            return Err(EngineError::InsufficientData {
                found: x.len().min(y.len()),
                required: 1,
            });
        }

        let params = config.tree_params();
        let n = x.len();
        let mut seeder = ChaCha8Rng::seed_from_u64(seed);

        let trees: Vec<DecisionTree> = (0..config.n_trees)
            .map(|_| {
                let mut rng = ChaCha8Rng::seed_from_u64(seeder.gen());
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, y, bootstrap, params, &mut rng)
            })
            .collect();

        debug!(
            n_trees = trees.len(),
            mean_depth = trees.iter().map(|t| t.depth()).sum::<usize>() as f64 / trees.len() as f64,
            "Random forest fitted"
        );

        Ok(Self { trees })
    }

    /// Build a forest from already fitted trees
    pub fn from_trees(trees: Vec<DecisionTree>) -> Result<Self> {
        let forest = Self { trees };
        forest.validate().map_err(EngineError::InvalidConfig)?;
        Ok(forest)
    }

    /// Check every tree of a deserialized forest
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("empty forest".into());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }

    /// Vote count per class `[no_irrigation, irrigate]`
    pub fn votes(&self, x: &[f64; NUM_FEATURES]) -> [usize; 2] {
        let mut votes = [0usize; 2];
        for tree in &self.trees {
            votes[tree.predict(x).index()] += 1;
        }
        votes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

impl Classifier for RandomForest {
    /// Majority vote; a tied vote falls back to the averaged probability
    fn predict(&self, x: &[f64; NUM_FEATURES]) -> IrrigationClass {
        let [no, yes] = self.votes(x);
        match yes.cmp(&no) {
            std::cmp::Ordering::Greater => IrrigationClass::Irrigate,
            std::cmp::Ordering::Less => IrrigationClass::NoIrrigation,
            std::cmp::Ordering::Equal => {
                if self.predict_proba(x).irrigate > 0.5 {
                    IrrigationClass::Irrigate
                } else {
                    IrrigationClass::NoIrrigation
                }
            }
        }
    }

    fn predict_proba(&self, x: &[f64; NUM_FEATURES]) -> ClassProbabilities {
        if self.trees.is_empty() {
            return ClassProbabilities::from_positive(0.0);
        }
        let sum: f64 = self
            .trees
            .iter()
            .map(|t| t.predict_proba(x).irrigate)
            .sum();
        let irrigate = (sum / self.trees.len() as f64).clamp(0.0, 1.0);
        ClassProbabilities::from_positive(irrigate)
    }

    /// Mean of per-tree normalized importances, renormalized to sum to 1.
    /// Stump-only forests report uniform weights.
    fn importance(&self) -> [f64; NUM_FEATURES] {
        let mut total = [0.0; NUM_FEATURES];
        let mut contributing = 0usize;
        for tree in &self.trees {
            let imp = tree.importance();
            if imp.iter().sum::<f64>() > 0.0 {
                for (t, v) in total.iter_mut().zip(imp) {
                    *t += v;
                }
                contributing += 1;
            }
        }
        let sum: f64 = total.iter().sum();
        if contributing == 0 || sum <= 0.0 {
            return [1.0 / NUM_FEATURES as f64; NUM_FEATURES];
        }
        total.map(|v| v / sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Positive iff the first feature exceeds 0, with the others as noise
    fn separable_data(n: usize) -> (Vec<[f64; NUM_FEATURES]>, Vec<IrrigationClass>) {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let x: Vec<[f64; NUM_FEATURES]> = (0..n)
            .map(|_| {
                [
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                ]
            })
            .collect();
        let y = x
            .iter()
            .map(|r| {
                if r[0] > 0.0 {
                    IrrigationClass::Irrigate
                } else {
                    IrrigationClass::NoIrrigation
                }
            })
            .collect();
        (x, y)
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_trees: 15,
            ..ForestConfig::default()
        }
    }

    #[test]
    fn test_default_config_matches_documented_values() {
        let config = ForestConfig::default();
        assert_eq!(config.n_trees, 100);
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.min_samples_split, 5);
        assert_eq!(config.min_samples_leaf, 2);
        assert_eq!(config.tree_params().max_features, 2);
    }

    #[test]
    fn test_fit_and_predict_separable() {
        let (x, y) = separable_data(200);
        let forest = RandomForest::fit(&x, &y, &small_config(), 42).unwrap();
        assert_eq!(forest.n_trees(), 15);

        assert_eq!(forest.predict(&[0.8, 0.0, 0.0, 0.0]), IrrigationClass::Irrigate);
        assert_eq!(forest.predict(&[-0.8, 0.0, 0.0, 0.0]), IrrigationClass::NoIrrigation);

        let importance = forest.importance();
        assert!((importance.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importance[0] > 0.5, "importance {:?}", importance);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = separable_data(120);
        let forest = RandomForest::fit(&x, &y, &small_config(), 1).unwrap();
        for row in x.iter().take(20) {
            let p = forest.predict_proba(row);
            assert!((p.no_irrigation + p.irrigate - 1.0).abs() < 1e-9);
            assert!((0.0..=1.0).contains(&p.irrigate));
        }
    }

    #[test]
    fn test_votes_cover_all_trees() {
        let (x, y) = separable_data(100);
        let forest = RandomForest::fit(&x, &y, &small_config(), 3).unwrap();
        let votes = forest.votes(&x[0]);
        assert_eq!(votes[0] + votes[1], forest.n_trees());
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = separable_data(100);
        let a = RandomForest::fit(&x, &y, &small_config(), 9).unwrap();
        let b = RandomForest::fit(&x, &y, &small_config(), 9).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (x, y) = separable_data(20);
        let config = ForestConfig {
            n_trees: 0,
            ..ForestConfig::default()
        };
        assert!(matches!(
            RandomForest::fit(&x, &y, &config, 1),
            Err(EngineError::InvalidConfig(_))
        ));

        let config = ForestConfig {
            max_features: Some(5),
            ..ForestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_input_rejected() {
        let result = RandomForest::fit(&[], &[], &ForestConfig::default(), 1);
        assert!(matches!(result, Err(EngineError::InsufficientData { .. })));
    }

    #[test]
    fn test_stump_forest_reports_uniform_importance() {
        let x = vec![[0.0; NUM_FEATURES]; 10];
        let y = vec![IrrigationClass::NoIrrigation; 10];
        let forest = RandomForest::fit(&x, &y, &small_config(), 1).unwrap();
        assert_eq!(forest.importance(), [0.25; NUM_FEATURES]);
        assert!(RandomForest::from_trees(Vec::new()).is_err());
    }
}
