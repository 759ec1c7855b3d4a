//! Irrigation Agent - predictive irrigation decision service
//!
//! Trains or loads the irrigation model at startup and serves monitoring
//! cycles, pump control, health and metrics over HTTP.

use anyhow::{Context, Result};
use irrigation_engine::{
    health::{components, HealthRegistry},
    observability::{EngineMetrics, StructuredLogger},
    DecisionEngine, IrrigationPredictor, Predictor,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where the startup model came from
#[derive(Debug, Clone, Copy)]
enum ModelSource {
    Loaded,
    Trained,
}

impl ModelSource {
    fn as_str(&self) -> &'static str {
        match self {
            ModelSource::Loaded => "loaded",
            ModelSource::Trained => "trained",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting irrigation-agent");

    let config = config::AgentConfig::load()?;
    info!(site = %config.site_name, api_port = config.api_port, "Agent configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::MODEL).await;
    health_registry.register(components::CONTROLLER).await;
    health_registry.register(components::API).await;
    health_registry
        .set_degraded(components::MODEL, "Model not yet available")
        .await;

    let metrics = EngineMetrics::new();
    let logger = StructuredLogger::new(&config.site_name);

    // The API starts with an untrained predictor; cycles return 503 until
    // the model below is published
    let engine = DecisionEngine::new(
        IrrigationPredictor::new_untrained(),
        &config.engine,
        logger.clone(),
    )
    .context("Failed to build decision engine")?;
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), engine));

    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state.clone(),
        shutdown_signal(),
    ));

    let started = Instant::now();
    let prepare_config = config.clone();
    let (predictor, source) =
        tokio::task::spawn_blocking(move || prepare_predictor(&prepare_config))
            .await
            .context("Model preparation task panicked")??;

    if let (ModelSource::Trained, Some(report)) = (source, predictor.report()) {
        let elapsed = started.elapsed().as_secs_f64();
        metrics.observe_training_duration(elapsed);
        logger.log_training_completed(report, elapsed);
    }

    app_state.engine.lock().await.set_predictor(predictor);
    health_registry.set_healthy(components::MODEL).await;
    health_registry.set_ready(true).await;
    logger.log_startup(AGENT_VERSION, source.as_str());

    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            health_registry
                .set_unhealthy(components::API, e.to_string())
                .await;
            return Err(e.context("API server failed"));
        }
        Err(e) => return Err(anyhow::anyhow!("API server task failed: {}", e)),
    }

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");
    Ok(())
}

/// Load the configured model, or train a new one and optionally save it
fn prepare_predictor(config: &config::AgentConfig) -> Result<(IrrigationPredictor, ModelSource)> {
    if let Some(path) = &config.model_path {
        match IrrigationPredictor::load(path) {
            Ok(predictor) => {
                info!(path = %path.display(), "Loaded saved model");
                return Ok((predictor, ModelSource::Loaded));
            }
            Err(e) if e.is_not_found() => {
                info!(path = %path.display(), "No saved model, training a new one");
            }
            Err(e) => {
                warn!(error = %e, "Saved model rejected, training a new one");
            }
        }
    }

    let predictor = IrrigationPredictor::train(config.engine.training.clone())
        .context("Failed to train irrigation model")?;

    if let (true, Some(path)) = (config.persist_model, &config.model_path) {
        match predictor.save(path) {
            Ok(()) => info!(path = %path.display(), "Model saved"),
            Err(e) => warn!(error = %e, "Failed to save model, continuing with in-memory model"),
        }
    }

    Ok((predictor, ModelSource::Trained))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
