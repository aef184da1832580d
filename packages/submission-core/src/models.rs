//! Row and transient types for the submission pipeline.
//!
//! `Job` 1—N `DirectorySubmission`, `Job` 1—N `HistoryEvent`,
//! `WorkerHeartbeat` soft-referencing `Job` via `current_job_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_priority", rename_all = "snake_case")]
pub enum JobPriority {
    #[default]
    Starter,
    Pro,
    Enterprise,
}

impl JobPriority {
    /// Parse from the loose string carried on queue messages, defaulting to
    /// `starter` on anything unrecognized.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw {
            "pro" => JobPriority::Pro,
            "enterprise" => JobPriority::Enterprise,
            "starter" => JobPriority::Starter,
            _ => JobPriority::Starter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::Starter => "starter",
            JobPriority::Pro => "pro",
            JobPriority::Enterprise => "enterprise",
        }
    }

    /// Rate-limit scaling factor applied to the planner's `rateLimitMs`:
    /// enterprise is faster, starter is slower.
    pub fn rate_limit_multiplier(&self) -> f64 {
        match self {
            JobPriority::Enterprise => 0.5,
            JobPriority::Pro => 1.0,
            JobPriority::Starter => 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "submission_status", rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitting,
    Submitted,
    Skipped,
    Failed,
}

impl SubmissionStatus {
    /// A row in one of these statuses is terminal and must never be
    /// overwritten by a later attempt with the same key.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Submitted | SubmissionStatus::Skipped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitting => "submitting",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Skipped => "skipped",
            SubmissionStatus::Failed => "failed",
        }
    }
}

/// Result of `DataAccess::upsert_job_result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    DuplicateSuccess,
}

// ============================================================================
// Job
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,

    pub customer_id: String,

    #[builder(default = 50)]
    pub package_size: i32,

    #[builder(default)]
    pub priority: JobPriority,

    #[builder(default)]
    pub status: JobStatus,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default, setter(strip_option))]
    pub started_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub completed_at: Option<DateTime<Utc>>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,

    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,
}

// ============================================================================
// DirectorySubmission (job_results row)
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct DirectorySubmission {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    pub job_id: Uuid,
    pub directory_name: String,
    pub status: SubmissionStatus,
    pub idempotency_key: String,

    #[builder(default, setter(strip_option))]
    pub payload: Option<serde_json::Value>,
    #[builder(default, setter(strip_option))]
    pub response_log: Option<serde_json::Value>,
    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// HistoryEvent (append-only)
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct HistoryEvent {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    pub job_id: Uuid,
    #[builder(default, setter(strip_option))]
    pub directory_name: Option<String>,
    pub event: String,
    #[builder(default = serde_json::json!({}))]
    pub details: serde_json::Value,
    #[builder(default, setter(strip_option))]
    pub worker_id: Option<String>,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// WorkerHeartbeat
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct WorkerHeartbeat {
    pub worker_id: String,
    pub queue_name: String,
    pub status: String,
    #[builder(default, setter(strip_option))]
    pub current_job_id: Option<Uuid>,
    #[builder(default = Utc::now())]
    pub last_heartbeat: DateTime<Utc>,
    #[builder(default = serde_json::json!({}))]
    pub metadata: serde_json::Value,
}

// ============================================================================
// Business profile / directory info (read-only projections)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BusinessProfile {
    pub business_name: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryInfo {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl DirectoryInfo {
    /// Synthesize a minimal record when no directory row exists, matching
    /// `original_source/backend/db/dao.py::get_directory_info`'s fallback.
    pub fn synthesize(directory_name: &str) -> Self {
        let url = if directory_name.starts_with("http") {
            directory_name.to_string()
        } else {
            format!("https://{directory_name}")
        };
        Self {
            id: directory_name.to_string(),
            name: directory_name.to_string(),
            url,
        }
    }
}

// ============================================================================
// Plan (transient, not persisted)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Goto,
    Fill,
    Click,
    Wait,
    Select,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub action: PlanAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptchaHint {
    None,
    Possible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConstraints {
    #[serde(rename = "rateLimitMs", default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
    #[serde(default = "default_captcha_hint")]
    pub captcha: CaptchaHint,
}

fn default_rate_limit_ms() -> u64 {
    1500
}

fn default_captcha_hint() -> CaptchaHint {
    CaptchaHint::None
}

impl Default for PlanConstraints {
    fn default() -> Self {
        Self {
            rate_limit_ms: default_rate_limit_ms(),
            captcha: default_captcha_hint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Plan {
    pub plan: Vec<PlanStep>,
    #[serde(default)]
    pub constraints: PlanConstraints,
    #[serde(default)]
    pub idempotency_factors: std::collections::BTreeMap<String, serde_json::Value>,
}
