//! Classifier training pipeline
//!
//! Generates synthetic samples, splits them with label stratification, fits
//! the standardizer on the training split only, fits the forest on the
//! scaled training rows and scores the held-out split.

use super::generator::{GeneratorConfig, SyntheticGenerator};
use super::scaler::Standardizer;
use crate::error::{EngineError, Result};
use crate::forest::{Classifier, ForestConfig, RandomForest};
use crate::models::{
    ClassProbabilities, FeatureName, FeatureVector, IrrigationClass, LabeledSample, NUM_FEATURES,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Minimum samples of each label needed to stratify a split
pub const MIN_SAMPLES_PER_CLASS: usize = 2;

/// Configuration for one training run
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of synthetic samples to generate
    pub samples: usize,
    /// Seed for generation, splitting and bagging
    pub seed: u64,
    /// Fraction of samples held out for evaluation
    pub test_fraction: f64,
    /// Held-out accuracy below which a warning is logged (none by default)
    pub min_accuracy: Option<f64>,
    pub generator: GeneratorConfig,
    pub forest: ForestConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            seed: 42,
            test_fraction: 0.2,
            min_accuracy: None,
            generator: GeneratorConfig::default(),
            forest: ForestConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if let Some(min) = self.min_accuracy {
            if !(0.0..=1.0).contains(&min) {
                return Err(EngineError::InvalidConfig(format!(
                    "min_accuracy must be in [0, 1], got {}",
                    min
                )));
            }
        }
        self.generator.validate()?;
        self.forest.validate()
    }
}

/// Summary of a completed training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub seed: u64,
    pub total_samples: usize,
    pub positive_samples: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    /// Held-out accuracy
    pub accuracy: f64,
    pub n_trees: usize,
}

impl TrainingReport {
    pub fn positive_ratio(&self) -> f64 {
        if self.total_samples == 0 {
            return 0.0;
        }
        self.positive_samples as f64 / self.total_samples as f64
    }
}

/// A fitted standardizer and forest, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub(crate) scaler: Standardizer,
    pub(crate) forest: RandomForest,
    pub(crate) feature_names: Vec<String>,
    pub(crate) report: TrainingReport,
}

impl TrainedModel {
    pub fn new(scaler: Standardizer, forest: RandomForest, report: TrainingReport) -> Self {
        Self {
            scaler,
            forest,
            feature_names: expected_feature_names(),
            report,
        }
    }

    fn scaled(&self, features: &FeatureVector) -> [f64; NUM_FEATURES] {
        self.scaler.transform(&features.to_array())
    }

    pub fn predict(&self, features: &FeatureVector) -> IrrigationClass {
        self.forest.predict(&self.scaled(features))
    }

    pub fn predict_proba(&self, features: &FeatureVector) -> ClassProbabilities {
        self.forest.predict_proba(&self.scaled(features))
    }

    pub fn importance(&self) -> [f64; NUM_FEATURES] {
        self.forest.importance()
    }

    pub fn scaler(&self) -> &Standardizer {
        &self.scaler
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }
}

/// Feature names stored alongside a model
pub fn expected_feature_names() -> Vec<String> {
    FeatureName::ALL.iter().map(|f| f.as_str().to_string()).collect()
}

/// Runs generation, splitting, scaling and fitting
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Generate the configured synthetic set and train on it
    pub fn run(&self) -> Result<TrainedModel> {
        self.config.validate()?;
        let samples = SyntheticGenerator::with_config(self.config.generator.clone())
            .generate(self.config.samples, self.config.seed)?;
        self.train(&samples)
    }

    /// Train on caller-provided samples
    pub fn train(&self, samples: &[LabeledSample]) -> Result<TrainedModel> {
        self.config.validate()?;
        let (train, test) =
            stratified_split(samples, self.config.test_fraction, self.config.seed)?;

        let train_rows: Vec<[f64; NUM_FEATURES]> =
            train.iter().map(|s| s.features.to_array()).collect();
        let train_labels: Vec<IrrigationClass> = train.iter().map(|s| s.label).collect();

        let scaler = Standardizer::fit(&train_rows);
        let scaled = scaler.transform_all(&train_rows);
        let forest = RandomForest::fit(
            &scaled,
            &train_labels,
            &self.config.forest,
            self.config.seed.wrapping_add(1),
        )?;

        let positive_samples = samples
            .iter()
            .filter(|s| s.label == IrrigationClass::Irrigate)
            .count();

        let mut model = TrainedModel::new(
            scaler,
            forest,
            TrainingReport {
                seed: self.config.seed,
                total_samples: samples.len(),
                positive_samples,
                train_samples: train.len(),
                test_samples: test.len(),
                accuracy: 0.0,
                n_trees: self.config.forest.n_trees,
            },
        );
        model.report.accuracy = evaluate(&model, &test);

        debug!(
            accuracy = model.report.accuracy,
            train_samples = model.report.train_samples,
            test_samples = model.report.test_samples,
            "Training run finished"
        );

        if let Some(min) = self.config.min_accuracy {
            if model.report.accuracy < min {
                warn!(
                    accuracy = model.report.accuracy,
                    min_accuracy = min,
                    "Held-out accuracy below configured minimum"
                );
            }
        }

        Ok(model)
    }
}

/// Fraction of samples the model labels correctly (0 for an empty set)
pub fn evaluate(model: &TrainedModel, samples: &[LabeledSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let correct = samples
        .iter()
        .filter(|s| model.predict(&s.features) == s.label)
        .count();
    correct as f64 / samples.len() as f64
}

/// Split into `(train, test)` preserving the label ratio in both parts.
///
/// Each label contributes `round(count * test_fraction)` test samples,
/// bounded so both parts keep at least one sample of every label.
pub fn stratified_split(
    samples: &[LabeledSample],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<LabeledSample>, Vec<LabeledSample>)> {
    let (mut negatives, mut positives): (Vec<LabeledSample>, Vec<LabeledSample>) = samples
        .iter()
        .copied()
        .partition(|s| s.label == IrrigationClass::NoIrrigation);

    let minority = negatives.len().min(positives.len());
    if minority < MIN_SAMPLES_PER_CLASS {
        return Err(EngineError::InsufficientData {
            found: minority,
            required: MIN_SAMPLES_PER_CLASS,
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(samples.len());
    let mut test = Vec::new();

    for group in [&mut negatives, &mut positives] {
        group.shuffle(&mut rng);
        let n_test =
            ((group.len() as f64 * test_fraction).round() as usize).clamp(1, group.len() - 1);
        test.extend(group.drain(..n_test));
        train.append(group);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok((train, test))
}
