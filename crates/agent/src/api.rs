//! HTTP API for monitoring cycles, pump control, health and metrics

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use irrigation_engine::{
    advisor::Recommendation,
    health::{ComponentStatus, HealthRegistry},
    ActuatorState, ControlMode, CycleReport, DecisionEngine, EngineError, FeatureVector,
    ModelSummary, Transition,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Shared application state
pub struct AppState {
    pub health_registry: HealthRegistry,
    /// Cycles and control requests are serialized through this lock
    pub engine: Mutex<DecisionEngine>,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, engine: DecisionEngine) -> Self {
        Self {
            health_registry,
            engine: Mutex::new(engine),
        }
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

pub enum ApiError {
    Engine(EngineError),
    Rejected(JsonRejection),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection)
    }
}

fn engine_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::InvalidFeature(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::ManualControlDisabled => StatusCode::CONFLICT,
        EngineError::ModelNotTrained => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Engine(err) => {
                let status = engine_status(&err);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(error = %err, "Request failed");
                }
                (
                    status,
                    ErrorBody {
                        error: err.to_string(),
                        kind: err.kind().to_string(),
                    },
                )
            }
            ApiError::Rejected(rejection) => {
                // Malformed or incomplete readings are invalid features
                let status = match rejection.status() {
                    StatusCode::BAD_REQUEST => StatusCode::UNPROCESSABLE_ENTITY,
                    other => other,
                };
                (
                    status,
                    ErrorBody {
                        error: rejection.body_text(),
                        kind: "invalid_feature".to_string(),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = if health.status == ComponentStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once a model is published
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn run_cycle(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FeatureVector>, JsonRejection>,
) -> ApiResult<CycleReport> {
    let Json(features) = payload?;
    let report = state.engine.lock().await.run_cycle(features)?;
    Ok(Json(report))
}

async fn recommendations(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FeatureVector>, JsonRejection>,
) -> ApiResult<Vec<Recommendation>> {
    let Json(features) = payload?;
    let advice = state.engine.lock().await.recommend(&features)?;
    Ok(Json(advice.into_iter().map(Recommendation::from).collect()))
}

async fn actuator(State(state): State<Arc<AppState>>) -> Json<ActuatorState> {
    Json(state.engine.lock().await.actuator_state())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModeRequest {
    pub mode: ControlMode,
}

async fn set_mode(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ModeRequest>, JsonRejection>,
) -> ApiResult<ActuatorState> {
    let Json(request) = payload?;
    Ok(Json(state.engine.lock().await.set_mode(request.mode)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub transition: Transition,
    pub actuator: ActuatorState,
}

async fn toggle(State(state): State<Arc<AppState>>) -> ApiResult<ToggleResponse> {
    let mut engine = state.engine.lock().await;
    let transition = engine.toggle_pump()?;
    Ok(Json(ToggleResponse {
        transition,
        actuator: engine.actuator_state(),
    }))
}

async fn model(State(state): State<Arc<AppState>>) -> Json<ModelSummary> {
    Json(state.engine.lock().await.model_summary())
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/cycle", post(run_cycle))
        .route("/api/v1/recommendations", post(recommendations))
        .route("/api/v1/actuator", get(actuator))
        .route("/api/v1/actuator/mode", put(set_mode))
        .route("/api/v1/actuator/toggle", post(toggle))
        .route("/api/v1/model", get(model))
        .with_state(state)
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use irrigation_engine::forest::ForestConfig;
    use irrigation_engine::health::components;
    use irrigation_engine::{
        EngineConfig, IrrigationPredictor, PumpState, StructuredLogger, TrainedModel,
        TrainingConfig, TrainingPipeline,
    };
    use std::sync::OnceLock;
    use tower::ServiceExt;

    fn shared_model() -> TrainedModel {
        static MODEL: OnceLock<TrainedModel> = OnceLock::new();
        MODEL
            .get_or_init(|| {
                TrainingPipeline::new(TrainingConfig {
                    samples: 400,
                    forest: ForestConfig {
                        n_trees: 15,
                        ..ForestConfig::default()
                    },
                    ..TrainingConfig::default()
                })
                .run()
                .unwrap()
            })
            .clone()
    }

    async fn setup_app(trained: bool) -> (Router, Arc<AppState>) {
        let health_registry = HealthRegistry::new();
        health_registry.register(components::MODEL).await;
        health_registry.register(components::API).await;

        let predictor = if trained {
            IrrigationPredictor::from_model(shared_model())
        } else {
            IrrigationPredictor::new_untrained()
        };
        let engine = DecisionEngine::new(
            predictor,
            &EngineConfig::default(),
            StructuredLogger::new("api-test"),
        )
        .unwrap();

        let state = Arc::new(AppState::new(health_registry, engine));
        (create_router(state.clone()), state)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn dry_reading() -> serde_json::Value {
        serde_json::json!({"humidity": 20.0, "ph": 6.5, "phosphorus": 25.0, "potassium": 150.0})
    }

    #[tokio::test]
    async fn test_healthz_returns_200_when_healthy() {
        let (app, _) = setup_app(true).await;
        let response = app.oneshot(empty_request("GET", "/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_healthz_returns_503_when_unhealthy() {
        let (app, state) = setup_app(true).await;
        state
            .health_registry
            .set_unhealthy(components::MODEL, "Load failed")
            .await;
        let response = app.oneshot(empty_request("GET", "/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_readyz_tracks_registry() {
        let (app, state) = setup_app(true).await;
        let response = app
            .clone()
            .oneshot(empty_request("GET", "/readyz"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.health_registry.set_ready(true).await;
        let response = app.oneshot(empty_request("GET", "/readyz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_exposes_irrigation_families() {
        let (app, _) = setup_app(true).await;
        app.clone()
            .oneshot(json_request("POST", "/api/v1/cycle", dry_reading()))
            .await
            .unwrap();

        let response = app.oneshot(empty_request("GET", "/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("irrigation_cycles_total"));
    }

    #[tokio::test]
    async fn test_cycle_returns_report() {
        let (app, _) = setup_app(true).await;
        let response = app
            .oneshot(json_request("POST", "/api/v1/cycle", dry_reading()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let report: CycleReport = body_json(response).await;
        assert_eq!(report.cycle, 1);
        assert_eq!(report.features.humidity, 20.0);
        assert!(!report.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_cycle_with_missing_field_is_422() {
        let (app, _) = setup_app(true).await;
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/cycle",
                serde_json::json!({"humidity": 20.0, "ph": 6.5}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorBody = body_json(response).await;
        assert_eq!(body.kind, "invalid_feature");
    }

    #[tokio::test]
    async fn test_cycle_without_model_is_503() {
        let (app, _) = setup_app(false).await;
        let response = app
            .oneshot(json_request("POST", "/api/v1/cycle", dry_reading()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: ErrorBody = body_json(response).await;
        assert_eq!(body.kind, "model_not_trained");
    }

    #[tokio::test]
    async fn test_recommendations_are_stateless() {
        let (app, state) = setup_app(false).await;
        let response = app
            .oneshot(json_request("POST", "/api/v1/recommendations", dry_reading()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let advice: Vec<Recommendation> = body_json(response).await;
        let codes: Vec<String> = advice.iter().map(|r| r.code.to_string()).collect();
        assert_eq!(codes, vec!["urgent_irrigation", "ph_ideal"]);
        assert_eq!(state.engine.lock().await.cycles(), 0);
    }

    #[tokio::test]
    async fn test_toggle_requires_manual_mode() {
        let (app, _) = setup_app(true).await;
        let response = app
            .clone()
            .oneshot(empty_request("POST", "/api/v1/actuator/toggle"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/v1/actuator/mode",
                serde_json::json!({"mode": "manual"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let state: ActuatorState = body_json(response).await;
        assert_eq!(state.mode, ControlMode::Manual);
        assert_eq!(state.pump, PumpState::Off);

        let response = app
            .clone()
            .oneshot(empty_request("POST", "/api/v1/actuator/toggle"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let toggled: ToggleResponse = body_json(response).await;
        assert_eq!(toggled.actuator.pump, PumpState::On);

        let response = app
            .oneshot(empty_request("GET", "/api/v1/actuator"))
            .await
            .unwrap();
        let state: ActuatorState = body_json(response).await;
        assert_eq!(state.pump, PumpState::On);
    }

    #[tokio::test]
    async fn test_unknown_mode_rejected() {
        let (app, _) = setup_app(true).await;
        let response = app
            .oneshot(json_request(
                "PUT",
                "/api/v1/actuator/mode",
                serde_json::json!({"mode": "turbo"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_model_summary() {
        let (app, _) = setup_app(true).await;
        let response = app
            .oneshot(empty_request("GET", "/api/v1/model"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let summary: ModelSummary = body_json(response).await;
        assert!(summary.trained);
        assert_eq!(summary.report.unwrap().n_trees, 15);
        let importance = summary.feature_importance.unwrap();
        assert!((importance.sum() - 1.0).abs() < 1e-6);
    }
}
