//! Rule-based agronomic advice and sensor alerts

mod alerts;
mod recommendations;

pub use alerts::{Alert, AlertEvaluator, AlertThresholds, SensorReport, SensorStatus};
pub use recommendations::{Advisory, Recommendation, RecommendationConfig, RecommendationEngine};
