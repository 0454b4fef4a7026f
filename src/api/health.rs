use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::time::Instant;

use crate::controller::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    storage: ComponentHealth,
    notifiers: Vec<&'static str>,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    backend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn healthy(backend: &'static str, latency_ms: u64) -> Self {
        Self {
            status: "healthy".to_string(),
            backend,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    fn unhealthy(backend: &'static str, error: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            backend,
            latency_ms: None,
            error: Some(error),
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// GET /api/health - Storage connectivity and configured notifiers
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let backend = state.repos.backend;

    let storage = match state.repos.ping().await {
        Ok(()) => ComponentHealth::healthy(backend, start.elapsed().as_millis() as u64),
        Err(e) => ComponentHealth::unhealthy(backend, e.to_string()),
    };
    let all_healthy = storage.is_healthy();

    let response = HealthResponse {
        status: if all_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        timestamp: chrono::Utc::now(),
        checks: HealthChecks {
            storage,
            notifiers: state.notifier.channels(),
        },
    };

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        tracing::warn!("health check degraded");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

/// GET /healthz - Liveness probe
pub async fn liveness_check() -> impl IntoResponse {
    StatusCode::OK
}
