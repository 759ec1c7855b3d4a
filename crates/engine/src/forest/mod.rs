//! Tree-ensemble classifier

mod ensemble;
mod tree;

pub use ensemble::{ForestConfig, RandomForest};
pub use tree::{DecisionTree, TreeNode, TreeParams};

use crate::models::{ClassProbabilities, IrrigationClass, NUM_FEATURES};

/// Trait for fitted binary classifiers over standardized features
pub trait Classifier {
    /// Predicted class for one row
    fn predict(&self, x: &[f64; NUM_FEATURES]) -> IrrigationClass;

    /// Class probabilities for one row
    fn predict_proba(&self, x: &[f64; NUM_FEATURES]) -> ClassProbabilities;

    /// Per-feature importance weights in model order
    fn importance(&self) -> [f64; NUM_FEATURES];
}
