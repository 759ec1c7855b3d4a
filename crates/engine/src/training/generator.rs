//! Synthetic training data generation
//!
//! Draws soil readings from clipped normal distributions tuned for corn and
//! labels them with a fixed agronomic score plus Gaussian noise.

use crate::error::{EngineError, Result};
use crate::models::{FeatureVector, IrrigationClass, LabeledSample};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;

/// Score above which a sample is labeled as needing irrigation
pub const LABEL_THRESHOLD: f64 = 1.5;

/// Standard deviation of the noise added to each score
pub const SCORE_NOISE_STD: f64 = 0.5;

/// A normal distribution clipped to `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippedNormal {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl ClippedNormal {
    pub const fn new(mean: f64, std_dev: f64, min: f64, max: f64) -> Self {
        Self {
            mean,
            std_dev,
            min,
            max,
        }
    }

    /// Parameters must be finite with `std_dev >= 0` and `min <= max`.
    pub fn validate(&self, name: &str) -> Result<()> {
        let finite = [self.mean, self.std_dev, self.min, self.max]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(EngineError::InvalidConfig(format!(
                "{} distribution has non-finite parameters",
                name
            )));
        }
        if self.std_dev < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "{} std_dev must be non-negative, got {}",
                name, self.std_dev
            )));
        }
        if self.min > self.max {
            return Err(EngineError::InvalidConfig(format!(
                "{} range [{}, {}] is empty",
                name, self.min, self.max
            )));
        }
        Ok(())
    }

    fn sampler(&self, name: &str) -> Result<Normal<f64>> {
        self.validate(name)?;
        Normal::new(self.mean, self.std_dev).map_err(|e| {
            EngineError::InvalidConfig(format!("{} distribution: {}", name, e))
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Per-field overrides of a [`ClippedNormal`]; unset fields keep the
/// feature's default
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClippedNormalOverride {
    mean: Option<f64>,
    std_dev: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
}

impl ClippedNormalOverride {
    fn apply(self, base: ClippedNormal) -> ClippedNormal {
        ClippedNormal {
            mean: self.mean.unwrap_or(base.mean),
            std_dev: self.std_dev.unwrap_or(base.std_dev),
            min: self.min.unwrap_or(base.min),
            max: self.max.unwrap_or(base.max),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeneratorConfigOverride {
    humidity: ClippedNormalOverride,
    ph: ClippedNormalOverride,
    phosphorus: ClippedNormalOverride,
    potassium: ClippedNormalOverride,
}

impl From<GeneratorConfigOverride> for GeneratorConfig {
    fn from(o: GeneratorConfigOverride) -> Self {
        let base = GeneratorConfig::default();
        Self {
            humidity: o.humidity.apply(base.humidity),
            ph: o.ph.apply(base.ph),
            phosphorus: o.phosphorus.apply(base.phosphorus),
            potassium: o.potassium.apply(base.potassium),
        }
    }
}

/// Distribution parameters for each generated feature
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "GeneratorConfigOverride")]
pub struct GeneratorConfig {
    pub humidity: ClippedNormal,
    pub ph: ClippedNormal,
    pub phosphorus: ClippedNormal,
    pub potassium: ClippedNormal,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            humidity: ClippedNormal::new(50.0, 15.0, 15.0, 85.0),
            ph: ClippedNormal::new(6.5, 0.5, 5.5, 8.0),
            phosphorus: ClippedNormal::new(25.0, 10.0, 5.0, 50.0),
            potassium: ClippedNormal::new(150.0, 30.0, 80.0, 250.0),
        }
    }
}

impl GeneratorConfig {
    fn columns(&self) -> [(&'static str, &ClippedNormal); 4] {
        [
            ("humidity", &self.humidity),
            ("ph", &self.ph),
            ("phosphorus", &self.phosphorus),
            ("potassium", &self.potassium),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        self.columns()
            .into_iter()
            .try_for_each(|(name, dist)| dist.validate(name))
    }
}

/// Generates labeled samples from agronomic rules
#[derive(Debug, Clone, Default)]
pub struct SyntheticGenerator {
    config: GeneratorConfig,
}

impl SyntheticGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate `n` labeled samples, reproducibly for a given seed.
    ///
    /// Each feature column is drawn in full before the next one, then one
    /// noise draw is taken per sample in order.
    pub fn generate(&self, n: usize, seed: u64) -> Result<Vec<LabeledSample>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let columns = self.config.columns();
        let mut drawn: Vec<Vec<f64>> = Vec::with_capacity(columns.len());
        for (name, dist) in columns {
            let normal = dist.sampler(name)?;
            let column = (0..n)
                .map(|_| normal.sample(&mut rng).clamp(dist.min, dist.max))
                .collect();
            drawn.push(column);
        }

        let noise = Normal::new(0.0, SCORE_NOISE_STD)
            .map_err(|e| EngineError::InvalidConfig(format!("score noise: {}", e)))?;

        let samples = (0..n)
            .map(|i| {
                let features =
                    FeatureVector::new(drawn[0][i], drawn[1][i], drawn[2][i], drawn[3][i]);
                let score = agronomic_score(&features) + noise.sample(&mut rng);
                let label = if score > LABEL_THRESHOLD {
                    IrrigationClass::Irrigate
                } else {
                    IrrigationClass::NoIrrigation
                };
                LabeledSample { features, label }
            })
            .collect();

        Ok(samples)
    }
}

/// Noise-free irrigation score for a reading
pub fn agronomic_score(features: &FeatureVector) -> f64 {
    let mut score = 0.0;

    if features.humidity < 40.0 {
        score += 3.0;
    } else if features.humidity < 50.0 {
        score += 1.0;
    } else if features.humidity > 70.0 {
        score -= 2.0;
    }

    if features.ph < 6.0 || features.ph > 7.0 {
        score += 1.0;
    }
    if features.phosphorus < 15.0 {
        score += 1.0;
    }
    if features.potassium < 120.0 {
        score += 1.0;
    }

    // Extreme dryness stacks on top of the first humidity rule
    if features.humidity < 30.0 {
        score += 2.0;
    }

    score
}
