//! Inbound queue message schema and validation, grounded on
//! `original_source/backend/orchestration/subscriber.py::process_message`'s
//! field-by-field validation with defaulting.

use serde::{Deserialize, Serialize};
use submission_core::JobPriority;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobMessage {
    pub job_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub package_size: Option<serde_json::Value>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub retry_attempt: Option<i32>,
    #[serde(default)]
    pub requeued_by: Option<String>,
    #[serde(default)]
    pub requeued_at: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// The normalized, validated form the flow runner actually consumes.
#[derive(Debug, Clone)]
pub struct ValidatedJob {
    pub job_id: String,
    pub customer_id: String,
    pub package_size: i32,
    pub priority: JobPriority,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("malformed JSON body: {0}")]
    MalformedJson(String),

    #[error("missing or empty job_id")]
    MissingJobId,

    #[error("missing customer_id")]
    MissingCustomerId,
}

const DEFAULT_PACKAGE_SIZE: i32 = 50;

/// Parses and validates a raw message body. Defaulting behavior:
/// - `package_size`: non-negative integer, else default 50.
/// - `priority`: one of starter/pro/enterprise, else default starter
///   (with a warning logged by the caller).
///
/// A malformed `job_id`/`customer_id` is fatal and drops the message; the
/// caller is expected to leave the message un-deleted so it redelivers
/// and eventually hits the DLQ threshold.
pub fn parse_and_validate(body: &str) -> Result<ValidatedJob, MessageError> {
    let raw: JobMessage =
        serde_json::from_str(body).map_err(|e| MessageError::MalformedJson(e.to_string()))?;

    if raw.job_id.trim().is_empty() {
        return Err(MessageError::MissingJobId);
    }
    if raw.customer_id.trim().is_empty() {
        return Err(MessageError::MissingCustomerId);
    }

    let package_size = raw
        .package_size
        .as_ref()
        .and_then(|v| v.as_i64())
        .filter(|n| *n >= 0)
        .map(|n| n as i32)
        .unwrap_or(DEFAULT_PACKAGE_SIZE);

    let priority = raw
        .priority
        .as_deref()
        .map(JobPriority::parse_or_default)
        .unwrap_or(JobPriority::Starter);

    Ok(ValidatedJob {
        job_id: raw.job_id,
        customer_id: raw.customer_id,
        package_size,
        priority,
    })
}
