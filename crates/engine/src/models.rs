//! Core data models for the irrigation engine

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of sensor features consumed by the model
pub const NUM_FEATURES: usize = 4;

/// Sensor features in model order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    Humidity,
    Ph,
    Phosphorus,
    Potassium,
}

impl FeatureName {
    /// All features, in the order the model sees them
    pub const ALL: [FeatureName; NUM_FEATURES] = [
        FeatureName::Humidity,
        FeatureName::Ph,
        FeatureName::Phosphorus,
        FeatureName::Potassium,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::Humidity => "humidity",
            FeatureName::Ph => "ph",
            FeatureName::Phosphorus => "phosphorus",
            FeatureName::Potassium => "potassium",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            FeatureName::Humidity => "Humidity",
            FeatureName::Ph => "pH",
            FeatureName::Phosphorus => "Phosphorus",
            FeatureName::Potassium => "Potassium",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            FeatureName::Humidity => 0,
            FeatureName::Ph => 1,
            FeatureName::Phosphorus => 2,
            FeatureName::Potassium => 3,
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One soil reading: humidity (%), pH, phosphorus (ppm), potassium (ppm)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub humidity: f64,
    pub ph: f64,
    pub phosphorus: f64,
    pub potassium: f64,
}

impl FeatureVector {
    pub fn new(humidity: f64, ph: f64, phosphorus: f64, potassium: f64) -> Self {
        Self {
            humidity,
            ph,
            phosphorus,
            potassium,
        }
    }

    /// Build from raw values in model order
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        match values {
            [humidity, ph, phosphorus, potassium] => {
                Ok(Self::new(*humidity, *ph, *phosphorus, *potassium))
            }
            _ => Err(EngineError::InvalidFeature(format!(
                "expected {} values, got {}",
                NUM_FEATURES,
                values.len()
            ))),
        }
    }

    pub fn to_array(&self) -> [f64; NUM_FEATURES] {
        [self.humidity, self.ph, self.phosphorus, self.potassium]
    }

    pub fn get(&self, name: FeatureName) -> f64 {
        self.to_array()[name.index()]
    }

    /// Reject vectors with non-finite fields. Out-of-range values are accepted.
    pub fn validate(&self) -> Result<()> {
        for name in FeatureName::ALL {
            let value = self.get(name);
            if !value.is_finite() {
                return Err(EngineError::InvalidFeature(format!(
                    "{} is not finite ({})",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Binary irrigation decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrigationClass {
    NoIrrigation,
    Irrigate,
}

impl IrrigationClass {
    pub fn from_label(label: u8) -> Self {
        if label == 0 {
            IrrigationClass::NoIrrigation
        } else {
            IrrigationClass::Irrigate
        }
    }

    /// Numeric label (0 = no irrigation, 1 = irrigate)
    pub fn label(&self) -> u8 {
        match self {
            IrrigationClass::NoIrrigation => 0,
            IrrigationClass::Irrigate => 1,
        }
    }

    pub fn index(&self) -> usize {
        self.label() as usize
    }
}

impl fmt::Display for IrrigationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrrigationClass::NoIrrigation => f.write_str("no_irrigation"),
            IrrigationClass::Irrigate => f.write_str("irrigate"),
        }
    }
}

/// A training example produced by the synthetic generator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub features: FeatureVector,
    pub label: IrrigationClass,
}

/// Class probabilities for one reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub no_irrigation: f64,
    pub irrigate: f64,
}

impl ClassProbabilities {
    pub fn from_positive(irrigate: f64) -> Self {
        Self {
            no_irrigation: 1.0 - irrigate,
            irrigate,
        }
    }

    /// `[p0, p1]`
    pub fn as_array(&self) -> [f64; 2] {
        [self.no_irrigation, self.irrigate]
    }
}

/// Normalized per-feature importance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub humidity: f64,
    pub ph: f64,
    pub phosphorus: f64,
    pub potassium: f64,
}

impl FeatureImportance {
    pub fn from_array(values: [f64; NUM_FEATURES]) -> Self {
        Self {
            humidity: values[0],
            ph: values[1],
            phosphorus: values[2],
            potassium: values[3],
        }
    }

    pub fn to_array(&self) -> [f64; NUM_FEATURES] {
        [self.humidity, self.ph, self.phosphorus, self.potassium]
    }

    /// Features paired with their weights, in model order
    pub fn entries(&self) -> [(FeatureName, f64); NUM_FEATURES] {
        let values = self.to_array();
        FeatureName::ALL.map(|name| (name, values[name.index()]))
    }

    pub fn sum(&self) -> f64 {
        self.to_array().iter().sum()
    }

    /// Feature with the largest weight
    pub fn dominant(&self) -> FeatureName {
        self.entries()
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| name)
            .unwrap_or(FeatureName::Humidity)
    }
}

/// Full explanation of one inference call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class: IrrigationClass,
    pub probability_positive: f64,
    pub feature_importance: FeatureImportance,
}

impl Prediction {
    pub fn label(&self) -> u8 {
        self.class.label()
    }
}
