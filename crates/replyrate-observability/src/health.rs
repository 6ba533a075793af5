//! Health endpoints
//!
//! - `/healthz` - liveness, 200 while the process is serving
//! - `/readyz` - readiness, 503 until the aggregation backend is usable
//! - `/metrics` - Prometheus text exposition

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{TEXT_FORMAT, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    NotReady,
}

/// Liveness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub status: Readiness,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backends: Vec<BackendStatus>,
}

/// One backend as seen by `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStatus {
    pub name: String,
    pub ready: bool,
    /// Endpoint or other context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Decides readiness for `/readyz`
pub trait ReadinessChecker: Send + Sync {
    fn is_ready(&self) -> bool;

    fn backend_statuses(&self) -> Vec<BackendStatus>;
}

/// State shared by the health routes
#[derive(Clone)]
pub struct HealthState {
    pub metrics: Arc<Metrics>,
    pub readiness_checker: Option<Arc<dyn ReadinessChecker>>,
}

impl HealthState {
    /// Without a checker the service always reports ready
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            readiness_checker: None,
        }
    }

    pub fn with_readiness_checker(mut self, checker: Arc<dyn ReadinessChecker>) -> Self {
        self.readiness_checker = Some(checker);
        self
    }
}

/// Create health check router
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn readyz(State(state): State<HealthState>) -> Response {
    let Some(checker) = &state.readiness_checker else {
        let body = ReadinessResponse {
            status: Readiness::Ready,
            backends: Vec::new(),
        };
        return (StatusCode::OK, Json(body)).into_response();
    };

    let (code, status) = if checker.is_ready() {
        (StatusCode::OK, Readiness::Ready)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Readiness::NotReady)
    };
    let body = ReadinessResponse {
        status,
        backends: checker.backend_statuses(),
    };
    (code, Json(body)).into_response()
}

async fn metrics_handler(State(state): State<HealthState>) -> Response {
    let families = state.metrics.registry().gather();
    match TextEncoder::new().encode_to_string(&families) {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", err),
        )
            .into_response(),
    }
}
