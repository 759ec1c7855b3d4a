//! Random forest inference service
//!
//! Wraps an optional [`TrainedModel`]. Every inference call validates the
//! reading first and fails with `ModelNotTrained` until a model is present.
//! Values outside the training ranges are passed to the model unchanged.

use super::persistence::{load_model, save_model};
use super::Predictor;
use crate::error::{EngineError, Result};
use crate::models::{
    ClassProbabilities, FeatureImportance, FeatureVector, IrrigationClass, Prediction,
};
use crate::training::{TrainedModel, TrainingConfig, TrainingPipeline, TrainingReport};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Inference latency above which a warning is logged
const MAX_INFERENCE_MS: u128 = 5;

/// Forest-backed predictor
#[derive(Debug, Default)]
pub struct IrrigationPredictor {
    model: Option<TrainedModel>,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl IrrigationPredictor {
    /// Create a predictor without a model; inference fails until one is set
    pub fn new_untrained() -> Self {
        Self::default()
    }

    pub fn from_model(model: TrainedModel) -> Self {
        Self {
            model: Some(model),
            ..Self::default()
        }
    }

    /// Generate synthetic data and train a model from `config`
    pub fn train(config: TrainingConfig) -> Result<Self> {
        let model = TrainingPipeline::new(config).run()?;
        Ok(Self::from_model(model))
    }

    /// Load a model written by [`IrrigationPredictor::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let model = load_model(path)?;
        debug!(path = %path.display(), n_trees = model.forest().n_trees(), "Model loaded");
        Ok(Self::from_model(model))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_model(self.model()?, path)
    }

    /// Replace the current model
    pub fn set_model(&mut self, model: TrainedModel) {
        self.model = Some(model);
    }

    pub fn model(&self) -> Result<&TrainedModel> {
        self.model.as_ref().ok_or(EngineError::ModelNotTrained)
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<IrrigationClass> {
        features.validate()?;
        Ok(self.model()?.predict(features))
    }

    pub fn predict_proba(&self, features: &FeatureVector) -> Result<ClassProbabilities> {
        features.validate()?;
        Ok(self.model()?.predict_proba(features))
    }

    /// Mean decrease in impurity, normalized to sum to 1
    pub fn feature_importance(&self) -> Result<FeatureImportance> {
        Ok(FeatureImportance::from_array(self.model()?.importance()))
    }

    /// Get inference statistics
    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
        }
    }
}

impl Predictor for IrrigationPredictor {
    fn explain(&self, features: &FeatureVector) -> Result<Prediction> {
        let start = Instant::now();
        features.validate()?;
        let model = self.model()?;

        let class = model.predict(features);
        let proba = model.predict_proba(features);
        let feature_importance = FeatureImportance::from_array(model.importance());

        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(Prediction {
            class,
            probability_positive: proba.irrigate,
            feature_importance,
        })
    }

    fn feature_importance(&self) -> Result<FeatureImportance> {
        IrrigationPredictor::feature_importance(self)
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn report(&self) -> Option<&TrainingReport> {
        self.model.as_ref().map(|m| m.report())
    }
}

/// Inference statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
}
