//! HTTP API: resource info, patching, health checks and Prometheus metrics

use agent_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    ResizeError, ResizeService, ResourceOverride,
};
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Single-page UI served at `/`
const INDEX_HTML: &str = include_str!("../templates/index.html");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: ResizeService,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(service: ResizeService, health_registry: HealthRegistry) -> Self {
        Self {
            service,
            health_registry,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Maps pipeline failures onto HTTP status codes
pub struct ApiError(ResizeError);

impl From<ResizeError> for ApiError {
    fn from(err: ResizeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            error!(error = %self.0, code = self.0.code(), "Request failed");
        } else {
            warn!(error = %self.0, code = self.0.code(), "Rejected request");
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn cpu_info(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.cpu_info().await?))
}

async fn mem_info(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.memory_info().await?))
}

async fn restarts(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.restarts().await?))
}

/// Apply a `{cpu?, memory?}` override. An empty body is an empty override.
async fn patch(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = decode_override(&body)?;
    info!(cpu = ?request.cpu, memory = ?request.memory, "Received patch request");
    Ok(Json(state.service.patch(&request).await?))
}

fn decode_override(body: &[u8]) -> Result<ResourceOverride, ResizeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ResourceOverride::default());
    }
    serde_json::from_slice(body).map_err(|e| ResizeError::Decode(e.to_string()))
}

/// Health check response - returns 200 if healthy, 503 if degraded/unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
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

/// One log line per request with method, URL, status and duration
async fn log_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let url = request.uri().to_string();

    let response = next.run(request).await;

    info!(
        method = %method,
        url = %url,
        status = response.status().as_u16(),
        duration = ?started.elapsed(),
        "request completed"
    );
    response
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/cpuInfo", get(cpu_info))
        .route("/api/memInfo", get(mem_info))
        .route("/api/restarts", get(restarts))
        .route("/api/patch", post(patch))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Start the API server, returning once `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let health_registry = state.health_registry.clone();
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            health_registry.record_success(components::API).await;
            listener
        }
        Err(e) => {
            health_registry
                .record_failure(components::API, format!("Failed to bind {}: {}", addr, e))
                .await;
            return Err(e).with_context(|| format!("Failed to bind API server to {}", addr));
        }
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
