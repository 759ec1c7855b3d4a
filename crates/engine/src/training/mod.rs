//! Synthetic data generation and model training

mod generator;
mod pipeline;
mod scaler;

pub use generator::{
    agronomic_score, ClippedNormal, GeneratorConfig, SyntheticGenerator, LABEL_THRESHOLD,
    SCORE_NOISE_STD,
};
pub use pipeline::{
    evaluate, expected_feature_names, stratified_split, TrainedModel, TrainingConfig,
    TrainingPipeline, TrainingReport, MIN_SAMPLES_PER_CLASS,
};
pub use scaler::Standardizer;
