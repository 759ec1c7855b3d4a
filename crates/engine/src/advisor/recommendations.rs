//! Agronomic recommendations for corn
//!
//! Rules are evaluated in a fixed order: humidity, pH, phosphorus,
//! potassium, then the overall assessment. The pH rule always emits exactly
//! one advisory, so the result is never empty for a valid reading.

use crate::error::{EngineError, Result};
use crate::models::FeatureVector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One piece of advice, identified by a stable code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    UrgentIrrigation,
    ConsiderIrrigation,
    CheckDrainage,
    AcidicSoil,
    AlkalineSoil,
    PhIdeal,
    LowPhosphorus,
    LowPotassium,
    IdealConditions,
    ConditionsAdequate,
}

impl Advisory {
    pub fn code(&self) -> &'static str {
        match self {
            Advisory::UrgentIrrigation => "urgent_irrigation",
            Advisory::ConsiderIrrigation => "consider_irrigation",
            Advisory::CheckDrainage => "check_drainage",
            Advisory::AcidicSoil => "acidic_soil",
            Advisory::AlkalineSoil => "alkaline_soil",
            Advisory::PhIdeal => "ph_ideal",
            Advisory::LowPhosphorus => "low_phosphorus",
            Advisory::LowPotassium => "low_potassium",
            Advisory::IdealConditions => "ideal_conditions",
            Advisory::ConditionsAdequate => "conditions_adequate",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Advisory::UrgentIrrigation => "Urgent irrigation needed: humidity is critical",
            Advisory::ConsiderIrrigation => "Consider irrigating: humidity is low",
            Advisory::CheckDrainage => "Humidity is high: check drainage",
            Advisory::AcidicSoil => "Acidic soil: consider liming",
            Advisory::AlkalineSoil => "Alkaline soil: consider sulfur",
            Advisory::PhIdeal => "pH is ideal for corn",
            Advisory::LowPhosphorus => "Low phosphorus: apply phosphate fertilizer",
            Advisory::LowPotassium => "Low potassium: apply potash fertilizer",
            Advisory::IdealConditions => "Ideal conditions for corn development",
            Advisory::ConditionsAdequate => "Conditions adequate: keep monitoring",
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Serializable advisory with its message, as returned to API clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub code: Advisory,
    pub message: String,
}

impl From<Advisory> for Recommendation {
    fn from(advisory: Advisory) -> Self {
        Self {
            code: advisory,
            message: advisory.message().to_string(),
        }
    }
}

/// Thresholds for the recommendation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Humidity (%) below which irrigation is urgent
    pub humidity_urgent: f64,
    /// Humidity (%) below which irrigation should be considered
    pub humidity_low: f64,
    /// Humidity (%) above which drainage should be checked
    pub humidity_high: f64,
    pub ph_acidic: f64,
    pub ph_alkaline: f64,
    /// Phosphorus (ppm) below which fertilizer is advised
    pub phosphorus_low: f64,
    /// Potassium (ppm) below which fertilizer is advised
    pub potassium_low: f64,
    /// Humidity (%) that must be exceeded for ideal conditions
    pub ideal_humidity: f64,
    pub ideal_ph_min: f64,
    pub ideal_ph_max: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            humidity_urgent: 35.0,
            humidity_low: 45.0,
            humidity_high: 75.0,
            ph_acidic: 6.0,
            ph_alkaline: 7.5,
            phosphorus_low: 15.0,
            potassium_low: 120.0,
            ideal_humidity: 45.0,
            ideal_ph_min: 6.0,
            ideal_ph_max: 7.0,
        }
    }
}

impl RecommendationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.humidity_urgent <= self.humidity_low && self.humidity_low <= self.humidity_high) {
            return Err(EngineError::InvalidConfig(format!(
                "humidity thresholds must satisfy urgent <= low <= high, got {} / {} / {}",
                self.humidity_urgent, self.humidity_low, self.humidity_high
            )));
        }
        if self.ph_acidic > self.ph_alkaline {
            return Err(EngineError::InvalidConfig(format!(
                "ph_acidic ({}) exceeds ph_alkaline ({})",
                self.ph_acidic, self.ph_alkaline
            )));
        }
        if self.ideal_ph_min > self.ideal_ph_max {
            return Err(EngineError::InvalidConfig(format!(
                "ideal_ph_min ({}) exceeds ideal_ph_max ({})",
                self.ideal_ph_min, self.ideal_ph_max
            )));
        }
        Ok(())
    }
}

/// Stateless rule engine
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new(config: RecommendationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Advisories for one reading, in rule order
    pub fn recommend(&self, features: &FeatureVector) -> Vec<Advisory> {
        let c = &self.config;
        let mut advice = Vec::with_capacity(4);

        if features.humidity < c.humidity_urgent {
            advice.push(Advisory::UrgentIrrigation);
        } else if features.humidity < c.humidity_low {
            advice.push(Advisory::ConsiderIrrigation);
        } else if features.humidity > c.humidity_high {
            advice.push(Advisory::CheckDrainage);
        }

        if features.ph < c.ph_acidic {
            advice.push(Advisory::AcidicSoil);
        } else if features.ph > c.ph_alkaline {
            advice.push(Advisory::AlkalineSoil);
        } else {
            advice.push(Advisory::PhIdeal);
        }

        if features.phosphorus < c.phosphorus_low {
            advice.push(Advisory::LowPhosphorus);
        }
        if features.potassium < c.potassium_low {
            advice.push(Advisory::LowPotassium);
        }

        if features.humidity > c.ideal_humidity
            && (c.ideal_ph_min..=c.ideal_ph_max).contains(&features.ph)
        {
            advice.push(Advisory::IdealConditions);
        }

        if advice.is_empty() {
            advice.push(Advisory::ConditionsAdequate);
        }
        advice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recommend(humidity: f64, ph: f64, phosphorus: f64, potassium: f64) -> Vec<Advisory> {
        RecommendationEngine::default().recommend(&FeatureVector::new(
            humidity, ph, phosphorus, potassium,
        ))
    }

    #[test]
    fn test_dry_soil_scenario() {
        assert_eq!(
            recommend(20.0, 6.5, 25.0, 150.0),
            vec![Advisory::UrgentIrrigation, Advisory::PhIdeal]
        );
    }

    #[test]
    fn test_wet_soil_scenario() {
        assert_eq!(
            recommend(80.0, 6.5, 25.0, 150.0),
            vec![Advisory::CheckDrainage, Advisory::PhIdeal, Advisory::IdealConditions]
        );
    }

    #[test]
    fn test_acidic_soil_scenario() {
        let advice = recommend(50.0, 5.0, 25.0, 150.0);
        assert!(advice.contains(&Advisory::AcidicSoil));
        assert!(!advice.contains(&Advisory::PhIdeal));
        assert!(!advice.contains(&Advisory::IdealConditions));
    }

    #[test]
    fn test_exactly_one_ph_advisory() {
        let ph_codes = [Advisory::AcidicSoil, Advisory::AlkalineSoil, Advisory::PhIdeal];
        for ph in [3.0, 5.99, 6.0, 6.5, 7.0, 7.5, 7.51, 9.0] {
            let advice = recommend(50.0, ph, 25.0, 150.0);
            let count = advice.iter().filter(|a| ph_codes.contains(a)).count();
            assert_eq!(count, 1, "ph {} gave {:?}", ph, advice);
        }
    }

    #[test]
    fn test_nutrient_rules_in_order() {
        assert_eq!(
            recommend(40.0, 7.8, 10.0, 100.0),
            vec![
                Advisory::ConsiderIrrigation,
                Advisory::AlkalineSoil,
                Advisory::LowPhosphorus,
                Advisory::LowPotassium,
            ]
        );
    }

    #[test]
    fn test_ideal_requires_humidity_strictly_above() {
        let advice = recommend(45.0, 6.5, 25.0, 150.0);
        assert_eq!(advice, vec![Advisory::PhIdeal]);
    }

    #[test]
    fn test_codes_are_snake_case() {
        let json = serde_json::to_string(&Advisory::CheckDrainage).unwrap();
        assert_eq!(json, "\"check_drainage\"");
        assert_eq!(Advisory::CheckDrainage.to_string(), "check_drainage");

        let entry = Recommendation::from(Advisory::LowPotassium);
        assert_eq!(entry.message, Advisory::LowPotassium.message());
    }

    #[test]
    fn test_config_validation() {
        assert!(RecommendationConfig::default().validate().is_ok());
        let inverted = RecommendationConfig {
            humidity_urgent: 50.0,
            ..RecommendationConfig::default()
        };
        assert!(matches!(inverted.validate(), Err(EngineError::InvalidConfig(_))));
    }
}
