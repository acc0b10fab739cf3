//! Health, readiness and metrics endpoints of the autoscaler daemon
//!
//! `/healthz` reports the per-component failure streaks, `/readyz` turns
//! green once the environment has been reset, and `/metrics` exposes the
//! process-wide Prometheus registry.

use autoscaler_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::AutoscalerMetrics,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{proto::MetricFamily, Encoder, TextEncoder};
use std::sync::Arc;
use tracing::{error, info};

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: AutoscalerMetrics,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, metrics: AutoscalerMetrics) -> Self {
        Self {
            health_registry,
            metrics,
        }
    }
}

/// 200 while the loop can still scale (healthy or degraded), 503 otherwise
async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    let health = state.health_registry.health().await;

    let code = if health.status == ComponentStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (code, Json(health)).into_response()
}

async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    let readiness = state.health_registry.readiness().await;

    let code = match readiness.ready {
        true => StatusCode::OK,
        false => StatusCode::SERVICE_UNAVAILABLE,
    };

    (code, Json(readiness)).into_response()
}

async fn metrics() -> Response {
    render_metrics(&prometheus::gather())
}

/// Text exposition of `families`; 500 when the encoder rejects them
fn render_metrics(families: &[MetricFamily]) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, families = families.len(), "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Bind `0.0.0.0:port` and serve until the task is aborted
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Health and metrics endpoints listening");

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
