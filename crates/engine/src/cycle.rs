//! One monitoring cycle: predict, advise, alert, actuate
//!
//! The controller is stepped last, after inference, recommendations and
//! alerts have all succeeded. A failed cycle leaves the actuator untouched.

use crate::actuator::{ActuatorController, ActuatorState, ControlMode, HysteresisConfig, Transition};
use crate::advisor::{
    Advisory, Alert, AlertEvaluator, AlertThresholds, Recommendation, RecommendationConfig,
    RecommendationEngine, SensorReport,
};
use crate::error::Result;
use crate::models::{FeatureImportance, FeatureVector, Prediction};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::predictor::{IrrigationPredictor, Predictor};
use crate::training::{TrainingConfig, TrainingReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// All engine settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub training: TrainingConfig,
    pub hysteresis: HysteresisConfig,
    pub recommendations: RecommendationConfig,
    pub alerts: AlertThresholds,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.hysteresis.validate()?;
        self.recommendations.validate()?;
        self.alerts.validate()
    }
}

/// Outcome of one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub features: FeatureVector,
    pub prediction: Prediction,
    pub recommendations: Vec<Recommendation>,
    pub alerts: Vec<Alert>,
    pub sensors: SensorReport,
    pub actuator: ActuatorState,
    pub transition: Option<Transition>,
}

/// Model details exposed to operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub trained: bool,
    pub report: Option<TrainingReport>,
    pub feature_importance: Option<FeatureImportance>,
}

/// Runs monitoring cycles against a predictor and owns the actuator
pub struct DecisionEngine<P = IrrigationPredictor> {
    predictor: P,
    recommender: RecommendationEngine,
    alerts: AlertEvaluator,
    controller: ActuatorController,
    metrics: EngineMetrics,
    logger: StructuredLogger,
    cycles: u64,
}

impl<P: Predictor> DecisionEngine<P> {
    pub fn new(predictor: P, config: &EngineConfig, logger: StructuredLogger) -> Result<Self> {
        config.validate()?;
        let metrics = EngineMetrics::new();
        if let Some(report) = predictor.report() {
            metrics.set_model_accuracy(report.accuracy);
        }
        let controller = ActuatorController::new(config.hysteresis)?;
        metrics.set_actuator_state(controller.state());

        Ok(Self {
            predictor,
            recommender: RecommendationEngine::new(config.recommendations.clone()),
            alerts: AlertEvaluator::new(config.alerts.clone()),
            controller,
            metrics,
            logger,
            cycles: 0,
        })
    }

    /// Swap in a new predictor; actuator state and cycle count carry over
    pub fn set_predictor(&mut self, predictor: P) {
        if let Some(report) = predictor.report() {
            self.metrics.set_model_accuracy(report.accuracy);
        }
        self.predictor = predictor;
    }

    /// Run one cycle for a reading
    pub fn run_cycle(&mut self, features: FeatureVector) -> Result<CycleReport> {
        let start = Instant::now();
        let cycle = self.cycles + 1;

        let prediction = match features.validate().and_then(|_| self.predictor.explain(&features)) {
            Ok(prediction) => prediction,
            Err(e) => {
                self.metrics.inc_cycle_errors(e.kind());
                self.logger.log_cycle_failed(cycle, &e.to_string());
                return Err(e);
            }
        };

        let recommendations = self
            .recommender
            .recommend(&features)
            .into_iter()
            .map(Recommendation::from)
            .collect();
        let alerts = self.alerts.evaluate(&features);
        let sensors = self.alerts.sensor_status(&features);

        let transition = self
            .controller
            .step(prediction.class, prediction.probability_positive);
        let actuator = self.controller.state();
        self.cycles = cycle;

        if let Some(t) = &transition {
            self.metrics.record_transition(t);
            self.logger
                .log_transition(t, Some(prediction.probability_positive));
        }
        self.metrics.set_actuator_state(actuator);
        self.metrics
            .record_cycle(prediction.probability_positive, &alerts);
        self.metrics
            .observe_cycle_latency(start.elapsed().as_secs_f64());
        self.logger.log_cycle(cycle, &prediction, actuator, &alerts);

        Ok(CycleReport {
            cycle,
            timestamp: Utc::now(),
            features,
            prediction,
            recommendations,
            alerts,
            sensors,
            actuator,
            transition,
        })
    }

    /// Stateless recommendations for a reading
    pub fn recommend(&self, features: &FeatureVector) -> Result<Vec<Advisory>> {
        features.validate()?;
        Ok(self.recommender.recommend(features))
    }

    pub fn set_mode(&mut self, mode: ControlMode) -> ActuatorState {
        let previous = self.controller.state().mode;
        if self.controller.set_mode(mode) {
            self.logger.log_mode_change(previous, mode);
            self.metrics.set_actuator_state(self.controller.state());
        }
        self.controller.state()
    }

    /// Flip the pump; only allowed in MANUAL mode
    pub fn toggle_pump(&mut self) -> Result<Transition> {
        let transition = self.controller.toggle()?;
        self.metrics.record_transition(&transition);
        self.metrics.set_actuator_state(self.controller.state());
        self.logger.log_transition(&transition, None);
        Ok(transition)
    }

    pub fn actuator_state(&self) -> ActuatorState {
        self.controller.state()
    }

    pub fn model_summary(&self) -> ModelSummary {
        ModelSummary {
            trained: self.predictor.is_trained(),
            report: self.predictor.report().cloned(),
            feature_importance: self.predictor.feature_importance().ok(),
        }
    }

    /// Completed cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }
}
