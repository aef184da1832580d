//! DAL surface, shaped as a narrow async trait so `submission-pipeline`
//! and `submission-queue` can be tested against a fake without a live
//! database — the same separation `intelligent-crawler::traits::CrawlerStorage`
//! uses for its own storage boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use submission_core::{
    BusinessProfile, DirectoryInfo, Job, JobStatus, SubmissionStatus, UpsertOutcome,
};
use uuid::Uuid;

use crate::DbError;

#[async_trait]
pub trait DataAccess: Send + Sync {
    /// A row already in a terminal status (submitted/skipped) is never
    /// overwritten; callers observing the conflict get
    /// `UpsertOutcome::DuplicateSuccess`.
    #[allow(clippy::too_many_arguments)]
    async fn upsert_job_result(
        &self,
        job_id: Uuid,
        directory: &str,
        status: SubmissionStatus,
        idempotency_key: &str,
        payload: Option<serde_json::Value>,
        response_log: Option<serde_json::Value>,
        error_message: Option<&str>,
    ) -> Result<UpsertOutcome, DbError>;

    /// Writes status and the appropriate timestamp: `started_at` on first
    /// transition to in_progress, `completed_at` on entering a terminal
    /// job status.
    async fn set_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), DbError>;

    /// Append-only; callers must tolerate failures without propagating
    /// them — this method itself still surfaces errors so the caller can
    /// choose to log-and-continue.
    async fn record_history(
        &self,
        job_id: Uuid,
        directory: Option<&str>,
        event: &str,
        details: Option<serde_json::Value>,
        worker_id: Option<&str>,
    ) -> Result<(), DbError>;

    async fn get_business_profile(&self, job_id: Uuid) -> Result<BusinessProfile, DbError>;

    async fn get_directory_info(&self, directory: &str) -> Result<DirectoryInfo, DbError>;

    /// Stable ordering, filtered to directories still pending.
    async fn get_directories_for_job(&self, job_id: Uuid) -> Result<Vec<String>, DbError>;

    async fn upsert_worker_heartbeat(
        &self,
        worker_id: &str,
        queue_name: &str,
        status: &str,
        current_job_id: Option<Uuid>,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), DbError>;

    /// Jobs in `in_progress` whose most recent heartbeat (if any) is older
    /// than `threshold_minutes`, or that have never had one while
    /// in_progress longer than the threshold.
    async fn find_stale_jobs(&self, threshold_minutes: i64) -> Result<Vec<Job>, DbError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Job, DbError>;

    async fn most_recent_heartbeat(&self, job_id: Uuid) -> Result<Option<DateTime<Utc>>, DbError>;

    async fn insert_job(&self, job: Job) -> Result<Job, DbError>;
}
