//! `POST /api/jobs/enqueue`, grounded on
//! `original_source/backend/orchestration/api/enqueue_job.py::enqueue_job`:
//! inserts the job row, builds the queue message body, and sends it,
//! returning the provider's message id alongside the queue identity.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use submission_core::{Job, JobPriority, JobStatus};

use crate::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub job_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub package_size: Option<i32>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: String,
    pub message_id: String,
    pub queue_provider: &'static str,
    pub queue_url: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

pub async fn enqueue_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnqueueRequest>,
) -> Response {
    if request.job_id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "job_id is required");
    }
    if request.customer_id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "customer_id is required");
    }

    let job_id: uuid::Uuid = match request.job_id.parse() {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "job_id must be a UUID"),
    };

    let package_size = request.package_size.filter(|n| *n >= 0).unwrap_or(50);
    let priority = request
        .priority
        .as_deref()
        .map(JobPriority::parse_or_default)
        .unwrap_or(JobPriority::Starter);

    if state.config.queue_url.trim().is_empty() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "queue is not configured");
    }

    let job = Job::builder()
        .id(job_id)
        .customer_id(request.customer_id.clone())
        .package_size(package_size)
        .priority(priority)
        .status(JobStatus::Pending)
        .build();

    if let Err(e) = state.dao.insert_job(job).await {
        tracing::error!(error = %e, "failed to insert job row for enqueue request");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to record job");
    }

    let body = serde_json::json!({
        "job_id": request.job_id,
        "customer_id": request.customer_id,
        "package_size": package_size,
        "priority": priority.as_str(),
        "source": "api",
        "metadata": request.metadata.unwrap_or_else(|| serde_json::json!({})),
    })
    .to_string();

    match state.transport.send(&state.config.queue_url, &body, HashMap::new()).await {
        Ok(message_id) => (
            StatusCode::OK,
            Json(EnqueueResponse {
                job_id: request.job_id,
                message_id,
                queue_provider: "sqs",
                queue_url: state.config.queue_url.clone(),
                status: "queued",
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to send enqueue message to queue");
            error_response(StatusCode::BAD_GATEWAY, format!("queue send failed: {e}"))
        }
    }
}
