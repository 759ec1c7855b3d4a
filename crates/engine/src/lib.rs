//! Decision engine for predictive corn irrigation
//!
//! This crate provides:
//! - Synthetic soil data generation and random forest training
//! - Inference with feature importance, plus model persistence
//! - Agronomic recommendations and sensor alerts
//! - Hysteresis pump control and the monitoring cycle tying it together
//! - Health checks and observability

pub mod actuator;
pub mod advisor;
pub mod cycle;
pub mod error;
pub mod forest;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod training;

pub use actuator::{ActuatorState, ControlMode, HysteresisConfig, PumpState, Transition};
pub use cycle::{CycleReport, DecisionEngine, EngineConfig, ModelSummary};
pub use error::{EngineError, ModelLoadError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use predictor::{IrrigationPredictor, Predictor};
pub use training::{TrainedModel, TrainingConfig, TrainingPipeline, TrainingReport};
