//! Inference and explanation over a trained model

mod inference;
mod persistence;

pub use inference::{InferenceStats, IrrigationPredictor};
pub use persistence::{compute_checksum, load_model, save_model, MODEL_FORMAT_VERSION};

use crate::error::Result;
use crate::models::{FeatureImportance, FeatureVector, Prediction};
use crate::training::TrainingReport;

/// Trait for prediction implementations
pub trait Predictor: Send + Sync {
    /// Class, positive probability and feature importance for one reading
    fn explain(&self, features: &FeatureVector) -> Result<Prediction>;

    /// Normalized importance of each feature in the current model
    fn feature_importance(&self) -> Result<FeatureImportance>;

    /// Whether a model is available for inference
    fn is_trained(&self) -> bool;

    /// Report of the training run behind the current model
    fn report(&self) -> Option<&TrainingReport>;
}
