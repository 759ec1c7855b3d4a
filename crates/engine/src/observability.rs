//! Observability infrastructure for the irrigation engine
//!
//! Provides:
//! - Prometheus metrics (cycle latency, training time, probability, pump state)
//! - Structured logging of decision events with tracing

use crate::actuator::{ActuatorState, ControlMode, PumpState, Transition};
use crate::advisor::Alert;
use crate::models::Prediction;
use crate::training::TrainingReport;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cycle latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Histogram buckets for training runs (in seconds)
const TRAINING_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    cycle_latency_seconds: Histogram,
    training_duration_seconds: Histogram,
    irrigation_probability: Gauge,
    pump_on: IntGauge,
    manual_mode: IntGauge,
    model_accuracy: Gauge,
    cycles: IntCounter,
    cycle_errors: IntCounterVec,
    pump_transitions: IntCounterVec,
    alerts: IntCounterVec,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "irrigation_cycle_latency_seconds",
                "Time spent running one monitoring cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            training_duration_seconds: register_histogram!(
                "irrigation_training_duration_seconds",
                "Time spent generating data and fitting the forest",
                TRAINING_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            irrigation_probability: register_gauge!(
                "irrigation_probability",
                "Irrigation probability from the latest cycle"
            )
            .expect("Failed to register irrigation_probability"),

            pump_on: register_int_gauge!(
                "irrigation_pump_on",
                "1 while the pump is on, 0 otherwise"
            )
            .expect("Failed to register pump_on"),

            manual_mode: register_int_gauge!(
                "irrigation_manual_mode",
                "1 while the controller is in manual mode"
            )
            .expect("Failed to register manual_mode"),

            model_accuracy: register_gauge!(
                "irrigation_model_accuracy",
                "Held-out accuracy of the loaded model"
            )
            .expect("Failed to register model_accuracy"),

            cycles: register_int_counter!(
                "irrigation_cycles_total",
                "Total number of completed monitoring cycles"
            )
            .expect("Failed to register cycles"),

            cycle_errors: register_int_counter_vec!(
                "irrigation_cycle_errors_total",
                "Total number of failed monitoring cycles",
                &["kind"]
            )
            .expect("Failed to register cycle_errors"),

            pump_transitions: register_int_counter_vec!(
                "irrigation_pump_transitions_total",
                "Total number of pump state changes",
                &["to", "reason"]
            )
            .expect("Failed to register pump_transitions"),

            alerts: register_int_counter_vec!(
                "irrigation_alerts_total",
                "Total number of sensor alerts raised",
                &["alert"]
            )
            .expect("Failed to register alerts"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
    }

    pub fn observe_training_duration(&self, duration_secs: f64) {
        self.inner().training_duration_seconds.observe(duration_secs);
    }

    pub fn set_model_accuracy(&self, accuracy: f64) {
        self.inner().model_accuracy.set(accuracy);
    }

    /// Record a completed cycle
    pub fn record_cycle(&self, probability: f64, alerts: &[Alert]) {
        let inner = self.inner();
        inner.cycles.inc();
        inner.irrigation_probability.set(probability);
        for alert in alerts {
            inner.alerts.with_label_values(&[alert.as_str()]).inc();
        }
    }

    pub fn inc_cycle_errors(&self, kind: &str) {
        self.inner().cycle_errors.with_label_values(&[kind]).inc();
    }

    pub fn record_transition(&self, transition: &Transition) {
        let to = transition.to.to_string();
        let reason = transition.reason.to_string();
        self.inner()
            .pump_transitions
            .with_label_values(&[to.as_str(), reason.as_str()])
            .inc();
    }

    /// Mirror the actuator state into gauges
    pub fn set_actuator_state(&self, state: ActuatorState) {
        let inner = self.inner();
        inner.pump_on.set(i64::from(state.pump == PumpState::On));
        inner.manual_mode.set(i64::from(state.mode == ControlMode::Manual));
    }

    pub fn cycles_total(&self) -> u64 {
        self.inner().cycles.get()
    }
}

/// Structured logger for decision events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    site: String,
}

impl StructuredLogger {
    pub fn new(site: impl Into<String>) -> Self {
        Self { site: site.into() }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn log_training_completed(&self, report: &TrainingReport, duration_secs: f64) {
        info!(
            event = "training_completed",
            site = %self.site,
            seed = report.seed,
            total_samples = report.total_samples,
            positive_ratio = report.positive_ratio(),
            accuracy = report.accuracy,
            n_trees = report.n_trees,
            duration_secs = duration_secs,
            "Irrigation model trained"
        );
    }

    pub fn log_cycle(
        &self,
        cycle: u64,
        prediction: &Prediction,
        state: ActuatorState,
        alerts: &[Alert],
    ) {
        info!(
            event = "cycle_decided",
            site = %self.site,
            cycle = cycle,
            class = %prediction.class,
            probability = prediction.probability_positive,
            dominant_feature = %prediction.feature_importance.dominant(),
            pump = %state.pump,
            mode = %state.mode,
            alerts = alerts.len(),
            "Monitoring cycle completed"
        );
    }

    pub fn log_transition(&self, transition: &Transition, probability: Option<f64>) {
        info!(
            event = "pump_transition",
            site = %self.site,
            from = %transition.from,
            to = %transition.to,
            reason = %transition.reason,
            probability = ?probability,
            "Pump state changed"
        );
    }

    pub fn log_mode_change(&self, from: ControlMode, to: ControlMode) {
        info!(
            event = "mode_changed",
            site = %self.site,
            from = %from,
            to = %to,
            "Control mode changed"
        );
    }

    pub fn log_cycle_failed(&self, cycle: u64, error: &str) {
        warn!(
            event = "cycle_failed",
            site = %self.site,
            cycle = cycle,
            error = %error,
            "Monitoring cycle failed, keeping previous actuator state"
        );
    }

    pub fn log_startup(&self, version: &str, model_source: &str) {
        info!(
            event = "agent_started",
            site = %self.site,
            agent_version = %version,
            model_source = %model_source,
            "Irrigation agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            site = %self.site,
            reason = %reason,
            "Irrigation agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::TransitionReason;

    #[test]
    fn test_engine_metrics_recording() {
        let metrics = EngineMetrics::new();
        let before = metrics.cycles_total();

        metrics.observe_cycle_latency(0.001);
        metrics.observe_training_duration(1.5);
        metrics.set_model_accuracy(0.9);
        metrics.record_cycle(0.8, &[Alert::LowHumidity]);
        metrics.inc_cycle_errors("invalid_feature");
        metrics.record_transition(&Transition {
            from: PumpState::Off,
            to: PumpState::On,
            reason: TransitionReason::Auto,
        });
        metrics.set_actuator_state(ActuatorState::default());

        assert!(metrics.cycles_total() > before);
    }

    #[test]
    fn test_metrics_handles_share_registry() {
        let a = EngineMetrics::new();
        let b = a.clone();
        let before = b.cycles_total();
        a.record_cycle(0.2, &[]);
        assert!(b.cycles_total() > before);

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"irrigation_cycles_total".to_string()));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("field-7");
        assert_eq!(logger.site(), "field-7");
    }
}
