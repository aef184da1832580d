//! C9: stale-job monitor. An independent periodic loop that finds jobs
//! stuck `in_progress` with no recent heartbeat and requeues them for
//! another pass, grounded on
//! `original_source/backend/orchestration/stale_job_monitor.py::check_and_requeue_stale_jobs`.
//! Each stale job is requeued with `retry_attempt` incremented and
//! `requeued_by`/`requeued_at` stamped so the subscriber and any operator
//! reading `queue_history` can tell it apart from a first attempt.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use submission_core::JobStatus;
use submission_db::DataAccess;
use tracing::{error, info, warn};

use crate::transport::QueueTransport;

const REQUEUED_BY: &str = "stale_job_monitor";

pub struct StaleMonitorConfig {
    pub queue_url: String,
    pub threshold_minutes: i64,
    pub check_interval_sec: u64,
}

pub struct StaleJobMonitor {
    transport: Arc<dyn QueueTransport>,
    dao: Arc<dyn DataAccess>,
    config: StaleMonitorConfig,
}

impl StaleJobMonitor {
    pub fn new(transport: Arc<dyn QueueTransport>, dao: Arc<dyn DataAccess>, config: StaleMonitorConfig) -> Self {
        Self { transport, dao, config }
    }

    /// Runs forever, sweeping at a fixed interval. Each job's requeue is
    /// isolated: one job's failure does not stop the sweep from finishing
    /// the rest.
    pub async fn run(&self) -> ! {
        info!(
            threshold_minutes = self.config.threshold_minutes,
            interval_sec = self.config.check_interval_sec,
            "starting stale job monitor"
        );

        loop {
            if let Err(e) = self.sweep_once().await {
                error!(error = %e, "stale job sweep failed");
            }
            tokio::time::sleep(Duration::from_secs(self.config.check_interval_sec)).await;
        }
    }

    async fn sweep_once(&self) -> Result<(), submission_db::DbError> {
        let stale = self.dao.find_stale_jobs(self.config.threshold_minutes).await?;

        if stale.is_empty() {
            return Ok(());
        }

        info!(count = stale.len(), "found stale jobs");

        for job in stale {
            if let Err(e) = self.requeue(&job).await {
                warn!(job_id = %job.id, error = %e, "failed to requeue stale job");
            }
        }

        Ok(())
    }

    async fn requeue(&self, job: &submission_core::Job) -> Result<(), RequeueError> {
        let body = serde_json::json!({
            "job_id": job.id.to_string(),
            "customer_id": job.customer_id,
            "package_size": job.package_size,
            "priority": job.priority.as_str(),
            "retry_attempt": 1,
            "requeued_by": REQUEUED_BY,
            "requeued_at": chrono::Utc::now().to_rfc3339(),
        })
        .to_string();

        self.transport
            .send(&self.config.queue_url, &body, HashMap::new())
            .await
            .map_err(RequeueError::Queue)?;

        self.dao
            .set_job_status(job.id, JobStatus::Pending, None)
            .await
            .map_err(RequeueError::Db)?;

        let _ = self
            .dao
            .record_history(
                job.id,
                None,
                "requeued_stale",
                Some(serde_json::json!({"requeued_by": REQUEUED_BY})),
                None,
            )
            .await;

        info!(job_id = %job.id, "requeued stale job");

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
enum RequeueError {
    #[error("queue send failed: {0}")]
    Queue(crate::transport::QueueError),
    #[error(transparent)]
    Db(submission_db::DbError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use submission_core::{BusinessProfile, DirectoryInfo, Job, SubmissionStatus, UpsertOutcome};
    use submission_db::DbError;
    use uuid::Uuid;

    use crate::transport::{QueueDepth, QueueError, RawMessage};

    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl QueueTransport for RecordingTransport {
        async fn receive(
            &self,
            _queue_url: &str,
            _max_messages: i32,
            _wait_seconds: i32,
            _visibility_timeout_seconds: i32,
        ) -> Result<Vec<RawMessage>, QueueError> {
            Ok(Vec::new())
        }

        async fn delete(&self, _queue_url: &str, _receipt_handle: &str) -> Result<(), QueueError> {
            Ok(())
        }

        async fn send(
            &self,
            _queue_url: &str,
            body: &str,
            _attributes: HashMap<String, String>,
        ) -> Result<String, QueueError> {
            if self.fail {
                return Err(QueueError::Transport("boom".to_string()));
            }
            self.sent.lock().unwrap().push(body.to_string());
            Ok("m1".to_string())
        }

        async fn peek(&self, _queue_url: &str, _max_messages: i32) -> Result<Vec<RawMessage>, QueueError> {
            Ok(Vec::new())
        }

        async fn depth(&self, _queue_url: &str) -> Result<QueueDepth, QueueError> {
            Ok(QueueDepth::default())
        }
    }

    struct FakeDao {
        stale: Vec<Job>,
        statuses: Mutex<Vec<(Uuid, JobStatus)>>,
    }

    #[async_trait]
    impl DataAccess for FakeDao {
        async fn upsert_job_result(
            &self,
            _job_id: Uuid,
            _directory: &str,
            _status: SubmissionStatus,
            _idempotency_key: &str,
            _payload: Option<serde_json::Value>,
            _response_log: Option<serde_json::Value>,
            _error_message: Option<&str>,
        ) -> Result<UpsertOutcome, DbError> {
            Ok(UpsertOutcome::Inserted)
        }

        async fn set_job_status(&self, job_id: Uuid, status: JobStatus, _error_message: Option<&str>) -> Result<(), DbError> {
            self.statuses.lock().unwrap().push((job_id, status));
            Ok(())
        }

        async fn record_history(
            &self,
            _job_id: Uuid,
            _directory: Option<&str>,
            _event: &str,
            _details: Option<serde_json::Value>,
            _worker_id: Option<&str>,
        ) -> Result<(), DbError> {
            Ok(())
        }

        async fn get_business_profile(&self, _job_id: Uuid) -> Result<BusinessProfile, DbError> {
            Ok(BusinessProfile::default())
        }

        async fn get_directory_info(&self, directory: &str) -> Result<DirectoryInfo, DbError> {
            Ok(DirectoryInfo::synthesize(directory))
        }

        async fn get_directories_for_job(&self, _job_id: Uuid) -> Result<Vec<String>, DbError> {
            Ok(Vec::new())
        }

        async fn upsert_worker_heartbeat(
            &self,
            _worker_id: &str,
            _queue_name: &str,
            _status: &str,
            _current_job_id: Option<Uuid>,
            _metadata: Option<serde_json::Value>,
        ) -> Result<(), DbError> {
            Ok(())
        }

        async fn find_stale_jobs(&self, _threshold_minutes: i64) -> Result<Vec<Job>, DbError> {
            Ok(self.stale.clone())
        }

        async fn get_job(&self, job_id: Uuid) -> Result<Job, DbError> {
            Err(DbError::JobNotFound(job_id))
        }

        async fn most_recent_heartbeat(&self, _job_id: Uuid) -> Result<Option<chrono::DateTime<chrono::Utc>>, DbError> {
            Ok(None)
        }

        async fn insert_job(&self, job: Job) -> Result<Job, DbError> {
            Ok(job)
        }
    }

    fn config() -> StaleMonitorConfig {
        StaleMonitorConfig {
            queue_url: "main".to_string(),
            threshold_minutes: 10,
            check_interval_sec: 1,
        }
    }

    #[tokio::test]
    async fn stale_job_is_requeued_and_marked_pending() {
        let job = Job::builder().customer_id("c1").status(JobStatus::InProgress).build();
        let job_id = job.id;
        let dao = Arc::new(FakeDao { stale: vec![job], statuses: Mutex::new(Vec::new()) });
        let transport = Arc::new(RecordingTransport { sent: Mutex::new(Vec::new()), fail: false });

        let monitor = StaleJobMonitor::new(transport.clone(), dao.clone(), config());
        monitor.sweep_once().await.unwrap();

        assert_eq!(transport.sent.lock().unwrap().len(), 1);
        let body = &transport.sent.lock().unwrap()[0];
        assert!(body.contains("stale_job_monitor"));
        assert!(body.contains(&job_id.to_string()));

        let statuses = dao.statuses.lock().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0], (job_id, JobStatus::Pending));
    }

    #[tokio::test]
    async fn no_stale_jobs_is_a_noop() {
        let dao = Arc::new(FakeDao { stale: Vec::new(), statuses: Mutex::new(Vec::new()) });
        let transport = Arc::new(RecordingTransport { sent: Mutex::new(Vec::new()), fail: false });

        let monitor = StaleJobMonitor::new(transport.clone(), dao.clone(), config());
        monitor.sweep_once().await.unwrap();

        assert!(transport.sent.lock().unwrap().is_empty());
        assert!(dao.statuses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn queue_send_failure_does_not_mark_job_pending() {
        let job = Job::builder().customer_id("c1").status(JobStatus::InProgress).build();
        let job_id = job.id;
        let dao = Arc::new(FakeDao { stale: vec![job], statuses: Mutex::new(Vec::new()) });
        let transport = Arc::new(RecordingTransport { sent: Mutex::new(Vec::new()), fail: true });

        let monitor = StaleJobMonitor::new(transport, dao.clone(), config());
        monitor.sweep_once().await.unwrap();

        assert!(dao.statuses.lock().unwrap().is_empty());
        let _ = job_id;
    }
}
