//! Threshold alerts and per-sensor status
//!
//! Alerts fire on low humidity, pH outside the accepted band, and low
//! nutrients. Sensor status adds a coarse classification per reading for
//! dashboards and the CLI.

use crate::error::{EngineError, Result};
use crate::models::FeatureVector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert thresholds, configurable per site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Humidity (%) below which a low-humidity alert fires
    pub humidity_min: f64,
    pub ph_min: f64,
    pub ph_max: f64,
    /// Phosphorus (ppm) below which an alert fires
    pub phosphorus_min: f64,
    /// Potassium (ppm) below which an alert fires
    pub potassium_min: f64,
    /// Humidity (%) below which the sensor status is critical
    pub humidity_critical: f64,
    /// Humidity (%) above which the sensor status is high
    pub humidity_high: f64,
    pub phosphorus_high: f64,
    pub potassium_high: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            humidity_min: 45.0,
            ph_min: 6.0,
            ph_max: 7.5,
            phosphorus_min: 15.0,
            potassium_min: 120.0,
            humidity_critical: 30.0,
            humidity_high: 75.0,
            phosphorus_high: 35.0,
            potassium_high: 200.0,
        }
    }
}

impl AlertThresholds {
    pub fn validate(&self) -> Result<()> {
        if self.ph_min > self.ph_max {
            return Err(EngineError::InvalidConfig(format!(
                "ph_min ({}) exceeds ph_max ({})",
                self.ph_min, self.ph_max
            )));
        }
        if self.humidity_critical > self.humidity_min || self.humidity_min > self.humidity_high {
            return Err(EngineError::InvalidConfig(format!(
                "humidity thresholds must satisfy critical <= min <= high, got {} / {} / {}",
                self.humidity_critical, self.humidity_min, self.humidity_high
            )));
        }
        Ok(())
    }
}

/// Alert type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    LowHumidity,
    PhOutOfRange,
    LowPhosphorus,
    LowPotassium,
}

impl Alert {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alert::LowHumidity => "low_humidity",
            Alert::PhOutOfRange => "ph_out_of_range",
            Alert::LowPhosphorus => "low_phosphorus",
            Alert::LowPotassium => "low_potassium",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Alert::LowHumidity => "Low humidity",
            Alert::PhOutOfRange => "pH out of range",
            Alert::LowPhosphorus => "Low phosphorus",
            Alert::LowPotassium => "Low potassium",
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    Critical,
    Low,
    Normal,
    High,
    OutOfRange,
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorStatus::Critical => write!(f, "critical"),
            SensorStatus::Low => write!(f, "low"),
            SensorStatus::Normal => write!(f, "normal"),
            SensorStatus::High => write!(f, "high"),
            SensorStatus::OutOfRange => write!(f, "out_of_range"),
        }
    }
}

/// Status of each sensor for one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReport {
    pub humidity: SensorStatus,
    pub ph: SensorStatus,
    pub phosphorus: SensorStatus,
    pub potassium: SensorStatus,
}

#[derive(Debug, Clone, Default)]
pub struct AlertEvaluator {
    thresholds: AlertThresholds,
}

impl AlertEvaluator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Alerts in sensor order: humidity, pH, phosphorus, potassium
    pub fn evaluate(&self, features: &FeatureVector) -> Vec<Alert> {
        let t = &self.thresholds;
        let mut alerts = Vec::new();
        if features.humidity < t.humidity_min {
            alerts.push(Alert::LowHumidity);
        }
        if !(t.ph_min..=t.ph_max).contains(&features.ph) {
            alerts.push(Alert::PhOutOfRange);
        }
        if features.phosphorus < t.phosphorus_min {
            alerts.push(Alert::LowPhosphorus);
        }
        if features.potassium < t.potassium_min {
            alerts.push(Alert::LowPotassium);
        }
        alerts
    }

    pub fn sensor_status(&self, features: &FeatureVector) -> SensorReport {
        let t = &self.thresholds;
        let humidity = if features.humidity < t.humidity_critical {
            SensorStatus::Critical
        } else if features.humidity < t.humidity_min {
            SensorStatus::Low
        } else if features.humidity > t.humidity_high {
            SensorStatus::High
        } else {
            SensorStatus::Normal
        };
        let ph = if (t.ph_min..=t.ph_max).contains(&features.ph) {
            SensorStatus::Normal
        } else {
            SensorStatus::OutOfRange
        };
        SensorReport {
            humidity,
            ph,
            phosphorus: band(features.phosphorus, t.phosphorus_min, t.phosphorus_high),
            potassium: band(features.potassium, t.potassium_min, t.potassium_high),
        }
    }
}

fn band(value: f64, low: f64, high: f64) -> SensorStatus {
    if value < low {
        SensorStatus::Low
    } else if value > high {
        SensorStatus::High
    } else {
        SensorStatus::Normal
    }
}
