//! `GET /health`: per-subsystem checks with overall status derived from
//! them, covering the subsystems this pipeline actually depends on: the
//! queue, required environment, and auth configuration.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    checks: HealthChecks,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct HealthChecks {
    queue: &'static str,
    environment: &'static str,
    auth: &'static str,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let queue_ok = state.transport.depth(&state.config.queue_url).await.is_ok();
    let environment_ok = !state.config.queue_url.is_empty() && !state.config.dlq_url.is_empty();
    let auth_ok = state.auth_tokens.is_configured();

    let queue = if queue_ok { "ok" } else { "error" };
    let environment = if environment_ok { "ok" } else { "error" };
    let auth = if auth_ok { "ok" } else { "not_configured" };

    let status = if queue_ok && environment_ok && auth_ok {
        "healthy"
    } else if queue_ok && environment_ok {
        "degraded"
    } else {
        "unhealthy"
    };

    let status_code = match status {
        "healthy" | "degraded" => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            checks: HealthChecks { queue, environment, auth },
            timestamp: chrono::Utc::now().to_rfc3339(),
        }),
    )
}
