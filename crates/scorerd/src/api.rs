//! HTTP API: scheduler-extender style scoring endpoints plus health checks
//! and Prometheus metrics

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use scorer_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    Placement, PriorityAdapter, ProfileCatalog, ScorerError, Workload,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub adapter: Arc<PriorityAdapter>,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, adapter: Arc<PriorityAdapter>) -> Self {
        Self {
            health_registry,
            adapter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrioritizeRequest {
    pub workload: Workload,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleCapacity {
    pub node: String,
    pub idle_core_equivalent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

/// Registry holding every component the daemon reports on
pub async fn tracked_health_registry(failure_threshold: u32) -> HealthRegistry {
    let registry = HealthRegistry::with_failure_threshold(failure_threshold);
    registry.register(components::TELEMETRY_STORE).await;
    registry
}

/// Scorer errors rendered as JSON with a matching status code
pub struct ApiError(ScorerError);

impl From<ScorerError> for ApiError {
    fn from(err: ScorerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            ScorerError::TopologyNotFound(_) => (StatusCode::NOT_FOUND, "topology_not_found"),
            ScorerError::UnknownSocket { .. } => (StatusCode::NOT_FOUND, "unknown_socket"),
            ScorerError::UnknownProfile(_) => (StatusCode::NOT_FOUND, "unknown_profile"),
            ScorerError::TelemetryUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "telemetry_unavailable")
            }
            ScorerError::Parse { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "parse_error"),
            ScorerError::EmptyInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "empty_input"),
            ScorerError::MissingMetric(_) => (StatusCode::UNPROCESSABLE_ENTITY, "missing_metric"),
            ScorerError::ConfigUnreadable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "config_unreadable")
            }
        };

        let body = ErrorBody {
            error: self.0.to_string(),
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// 200 while healthy or degraded, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %err, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn prioritize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PrioritizeRequest>,
) -> impl IntoResponse {
    let list = state
        .adapter
        .prioritize(&request.workload, &request.nodes)
        .await;
    Json(list)
}

async fn score_node(
    State(state): State<Arc<AppState>>,
    Path(node): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.adapter.score(&node).await?;
    Ok(Json(result))
}

async fn idle_capacity(
    State(state): State<Arc<AppState>>,
    Path(node): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let idle_core_equivalent = state
        .adapter
        .selector()
        .idle_core_equivalent(&node)
        .await?;
    Ok(Json(IdleCapacity {
        node,
        idle_core_equivalent,
    }))
}

async fn record_placement(
    State(state): State<Arc<AppState>>,
    Json(placement): Json<Placement>,
) -> Result<StatusCode, ApiError> {
    state.adapter.record_placement(&placement).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn show_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.adapter.selector().cache().snapshot().await)
}

async fn flush_cache(State(state): State<Arc<AppState>>) -> StatusCode {
    state.adapter.flush_cache().await;
    StatusCode::NO_CONTENT
}

async fn profiles(State(state): State<Arc<AppState>>) -> Json<ProfileCatalog> {
    Json(state.adapter.profiles().clone())
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/prioritize", post(prioritize))
        .route("/api/v1/nodes/:node/score", get(score_node))
        .route("/api/v1/nodes/:node/idle", get(idle_capacity))
        .route("/api/v1/placements", post(record_placement))
        .route("/api/v1/cache", get(show_cache).delete(flush_cache))
        .route("/api/v1/profiles", get(profiles))
        .with_state(state)
}

pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
