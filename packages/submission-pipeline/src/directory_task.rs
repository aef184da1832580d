//! C6: directory task. One call submits a business to one directory and
//! always returns a [`DirectoryResult`] — grounded on
//! `original_source/backend/orchestration/tasks.py::submit_directory`,
//! whose Prefect task wraps the same body in `retries=3,
//! retry_delay_seconds=30, timeout_seconds=480`.
//!
//! Unlike Prefect's blanket retry-on-any-exception, failures here classify
//! themselves via [`PipelineError::failure_kind`] (mirroring
//! `kernel/jobs/runner.rs::classify_error`): a missing business profile is
//! non-retryable and fails the directory immediately, while a planner
//! outage or a failed submission attempt consumes the retry budget.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use submission_advisors::{AbTestAssigner, AbVariant, DescriptionCustomizer, RetryAnalyzer};
use submission_core::{
    idempotency_key, FailureKind, JobPriority, PipelineError, SubmissionStatus, UpsertOutcome,
};
use submission_db::{DataAccess, DbError};
use submission_executor::SubmissionExecutor;
use submission_planner::PlanProvider;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_PER_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(480);

#[derive(Debug, Clone)]
pub struct DirectoryResult {
    pub status: SubmissionStatus,
    pub directory: String,
    pub duration_ms: u64,
}

/// Collaborators for one directory submission, bundled the way
/// `JobRunnerConfig` bundles a `JobRunner`'s dependencies.
pub struct DirectoryTaskDeps {
    pub dao: Arc<dyn DataAccess>,
    pub planner: Arc<dyn PlanProvider>,
    pub executor: Arc<SubmissionExecutor>,
    pub description_customizer: Arc<dyn DescriptionCustomizer>,
    pub ab_assigner: Arc<dyn AbTestAssigner>,
    pub retry_analyzer: Arc<dyn RetryAnalyzer>,
    pub worker_id: String,
    retry_delay: Duration,
    per_attempt_timeout: Duration,
}

impl DirectoryTaskDeps {
    pub fn new(
        dao: Arc<dyn DataAccess>,
        planner: Arc<dyn PlanProvider>,
        executor: Arc<SubmissionExecutor>,
        description_customizer: Arc<dyn DescriptionCustomizer>,
        ab_assigner: Arc<dyn AbTestAssigner>,
        retry_analyzer: Arc<dyn RetryAnalyzer>,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            dao,
            planner,
            executor,
            description_customizer,
            ab_assigner,
            retry_analyzer,
            worker_id: worker_id.into(),
            retry_delay: DEFAULT_RETRY_DELAY,
            per_attempt_timeout: DEFAULT_PER_ATTEMPT_TIMEOUT,
        }
    }

    /// Overrides the fixed inter-attempt delay. Production callers leave
    /// this at the default; tests shrink it so the retry loop doesn't
    /// block on real 30-second sleeps.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = timeout;
        self
    }
}

fn fallback_key(job_id: Uuid, directory: &str) -> String {
    idempotency_key(&job_id.to_string(), directory, &BTreeMap::new())
}

pub async fn run_directory_task(
    deps: &DirectoryTaskDeps,
    job_id: Uuid,
    directory: &str,
    priority: JobPriority,
) -> DirectoryResult {
    let started = Instant::now();

    if directory.trim().is_empty() {
        warn!(%job_id, "rejected empty directory name");
        return DirectoryResult {
            status: SubmissionStatus::Failed,
            directory: directory.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
    }

    let mut last_error = String::new();

    for attempt in 0..MAX_ATTEMPTS {
        let outcome = tokio::time::timeout(
            deps.per_attempt_timeout,
            attempt_once(deps, job_id, directory, priority, attempt),
        )
        .await;

        match outcome {
            Ok(Ok(status)) => {
                return DirectoryResult {
                    status,
                    directory: directory.to_string(),
                    duration_ms: started.elapsed().as_millis() as u64,
                };
            }
            Ok(Err(e)) => {
                last_error = e.to_string();
                if e.failure_kind() == FailureKind::NonRetryable {
                    info!(directory, attempt, error = %last_error, "directory task failed, not retrying");
                    break;
                }
                if let Err(advisor_err) = deps
                    .retry_analyzer
                    .analyze_failure(directory, &last_error, attempt + 1)
                    .await
                {
                    warn!(directory, error = %advisor_err, "retry analyzer call failed");
                }
            }
            Err(_) => {
                last_error = format!("attempt {} timed out after {:?}", attempt + 1, deps.per_attempt_timeout);
                warn!(directory, attempt, "directory task attempt timed out");
            }
        }

        if attempt + 1 < MAX_ATTEMPTS {
            tokio::time::sleep(deps.retry_delay).await;
        }
    }

    let key = fallback_key(job_id, directory);
    if let Err(e) = deps
        .dao
        .upsert_job_result(
            job_id,
            directory,
            SubmissionStatus::Failed,
            &key,
            None,
            None,
            Some(&last_error),
        )
        .await
    {
        warn!(directory, error = %e, "failed to persist exhausted-retry failure");
    }

    DirectoryResult {
        status: SubmissionStatus::Failed,
        directory: directory.to_string(),
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

async fn attempt_once(
    deps: &DirectoryTaskDeps,
    job_id: Uuid,
    directory: &str,
    priority: JobPriority,
    attempt: u32,
) -> Result<SubmissionStatus, PipelineError> {
    let mut profile = match deps.dao.get_business_profile(job_id).await {
        Ok(p) => p,
        Err(DbError::JobNotFound(_)) => {
            let key = fallback_key(job_id, directory);
            let _ = deps
                .dao
                .upsert_job_result(
                    job_id,
                    directory,
                    SubmissionStatus::Failed,
                    &key,
                    None,
                    None,
                    Some("business profile not found"),
                )
                .await;
            let _ = deps
                .dao
                .record_history(
                    job_id,
                    Some(directory),
                    "error_no_profile",
                    Some(json!({"job_id": job_id.to_string()})),
                    Some(&deps.worker_id),
                )
                .await;
            return Err(PipelineError::NotFound(format!("no business profile for job {job_id}")));
        }
        Err(e) => return Err(PipelineError::TransientRemote(e.to_string())),
    };

    let variant = deps
        .ab_assigner
        .assign(&job_id.to_string(), directory)
        .await
        .unwrap_or(AbVariant::Control);

    match deps.description_customizer.customize(directory, &profile.description).await {
        Ok(customized) => profile.description = customized,
        Err(e) => warn!(directory, error = %e, "description customization failed, using original"),
    }

    let plan = deps
        .planner
        .get_plan(directory, &profile)
        .await
        .map_err(|e| PipelineError::TransientRemote(e.to_string()))?;

    let factors = if plan.idempotency_factors.is_empty() {
        let mut f = BTreeMap::new();
        f.insert("name".to_string(), json!(profile.business_name));
        f.insert("dir".to_string(), json!(directory));
        f
    } else {
        plan.idempotency_factors.clone()
    };
    let key = idempotency_key(&job_id.to_string(), directory, &factors);

    let preflight = deps
        .dao
        .upsert_job_result(job_id, directory, SubmissionStatus::Submitting, &key, None, None, None)
        .await
        .map_err(|e| PipelineError::TransientRemote(e.to_string()))?;

    if preflight == UpsertOutcome::DuplicateSuccess {
        let _ = deps
            .dao
            .record_history(job_id, Some(directory), "skipped_duplicate", None, Some(&deps.worker_id))
            .await;
        return Ok(SubmissionStatus::Skipped);
    }

    let _ = deps
        .dao
        .record_history(job_id, Some(directory), "submitting", None, Some(&deps.worker_id))
        .await;

    let rate_limit_ms = plan.constraints.rate_limit_ms as f64 * priority.rate_limit_multiplier();
    let rate_limit_ms = if priority == JobPriority::Enterprise {
        (rate_limit_ms as u64).max(500)
    } else {
        rate_limit_ms as u64
    };
    tokio::time::sleep(Duration::from_millis(rate_limit_ms)).await;

    let result = deps.executor.run_plan(job_id, directory, &plan, &profile).await;

    let _ = deps
        .dao
        .upsert_job_result(
            job_id,
            directory,
            result.status,
            &key,
            Some(json!({"ab_variant": variant})),
            Some(result.response_log.clone()),
            result.error_message.as_deref(),
        )
        .await;

    let event = if result.status == SubmissionStatus::Submitted {
        "submitted"
    } else {
        "submission_failed"
    };
    let _ = deps
        .dao
        .record_history(
            job_id,
            Some(directory),
            event,
            Some(json!({
                "duration_ms": result.duration_ms,
                "listing_url": result.listing_url,
                "attempt": attempt + 1,
            })),
            Some(&deps.worker_id),
        )
        .await;

    if result.status == SubmissionStatus::Failed {
        return Err(PipelineError::ExecutorFailure(
            result.error_message.unwrap_or_else(|| "submission failed".to_string()),
        ));
    }

    Ok(result.status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use submission_advisors::noop::{NoopAbTestAssigner, NoopDescriptionCustomizer, NoopFormMapper, NoopRetryAnalyzer};
    use submission_core::{BusinessProfile, JobStatus, Plan, PlanAction, PlanConstraints, PlanStep};
    use submission_executor::{BrowserDriver, DriverError, PageSnapshot};
    use submission_planner::PlannerError;

    struct FakeDao {
        profile: Option<BusinessProfile>,
        duplicate_on_preflight: bool,
        preflight_calls: AtomicU32,
        history: Mutex<Vec<String>>,
    }

    impl FakeDao {
        fn with_profile(profile: BusinessProfile) -> Self {
            Self {
                profile: Some(profile),
                duplicate_on_preflight: false,
                preflight_calls: AtomicU32::new(0),
                history: Mutex::new(Vec::new()),
            }
        }

        fn not_found() -> Self {
            Self {
                profile: None,
                duplicate_on_preflight: false,
                preflight_calls: AtomicU32::new(0),
                history: Mutex::new(Vec::new()),
            }
        }

        fn duplicate(profile: BusinessProfile) -> Self {
            Self {
                profile: Some(profile),
                duplicate_on_preflight: true,
                preflight_calls: AtomicU32::new(0),
                history: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DataAccess for FakeDao {
        async fn upsert_job_result(
            &self,
            _job_id: Uuid,
            _directory: &str,
            status: SubmissionStatus,
            _idempotency_key: &str,
            _payload: Option<serde_json::Value>,
            _response_log: Option<serde_json::Value>,
            _error_message: Option<&str>,
        ) -> Result<UpsertOutcome, DbError> {
            if status == SubmissionStatus::Submitting {
                self.preflight_calls.fetch_add(1, Ordering::SeqCst);
                if self.duplicate_on_preflight {
                    return Ok(UpsertOutcome::DuplicateSuccess);
                }
                return Ok(UpsertOutcome::Inserted);
            }
            Ok(UpsertOutcome::Updated)
        }

        async fn set_job_status(
            &self,
            _job_id: Uuid,
            _status: JobStatus,
            _error_message: Option<&str>,
        ) -> Result<(), DbError> {
            Ok(())
        }

        async fn record_history(
            &self,
            _job_id: Uuid,
            _directory: Option<&str>,
            event: &str,
            _details: Option<serde_json::Value>,
            _worker_id: Option<&str>,
        ) -> Result<(), DbError> {
            self.history.lock().unwrap().push(event.to_string());
            Ok(())
        }

        async fn get_business_profile(&self, job_id: Uuid) -> Result<BusinessProfile, DbError> {
            self.profile.clone().ok_or(DbError::JobNotFound(job_id))
        }

        async fn get_directory_info(&self, directory: &str) -> Result<submission_core::DirectoryInfo, DbError> {
            Ok(submission_core::DirectoryInfo::synthesize(directory))
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

        async fn find_stale_jobs(&self, _threshold_minutes: i64) -> Result<Vec<submission_core::Job>, DbError> {
            Ok(Vec::new())
        }

        async fn get_job(&self, job_id: Uuid) -> Result<submission_core::Job, DbError> {
            Err(DbError::JobNotFound(job_id))
        }

        async fn most_recent_heartbeat(&self, _job_id: Uuid) -> Result<Option<chrono::DateTime<chrono::Utc>>, DbError> {
            Ok(None)
        }

        async fn insert_job(&self, job: submission_core::Job) -> Result<submission_core::Job, DbError> {
            Ok(job)
        }
    }

    struct FakePlanner {
        plan: Plan,
    }

    #[async_trait]
    impl PlanProvider for FakePlanner {
        async fn get_plan(&self, _directory: &str, _business: &BusinessProfile) -> Result<Plan, PlannerError> {
            Ok(self.plan.clone())
        }
    }

    fn simple_plan() -> Plan {
        Plan {
            plan: vec![PlanStep {
                action: PlanAction::Goto,
                url: Some("https://directory.example/submit".into()),
                selector: None,
                value: None,
                until: None,
                seconds: None,
            }],
            constraints: PlanConstraints {
                rate_limit_ms: 1,
                ..PlanConstraints::default()
            },
            idempotency_factors: BTreeMap::new(),
        }
    }

    struct HtmlDriver {
        html: String,
    }

    #[async_trait]
    impl BrowserDriver for HtmlDriver {
        async fn launch(&self) -> Result<(), DriverError> {
            Ok(())
        }

        async fn execute_step(&self, _step: &PlanStep) -> Result<(), DriverError> {
            Ok(())
        }

        async fn screenshot_and_content(&self) -> Result<PageSnapshot, DriverError> {
            Ok(PageSnapshot {
                url: "https://directory.example/listing/1".to_string(),
                html: self.html.clone(),
            })
        }

        async fn close(&self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    fn profile() -> BusinessProfile {
        BusinessProfile {
            business_name: "Acme Roofing".to_string(),
            email: "hi@acme.example".to_string(),
            ..Default::default()
        }
    }

    fn deps_with(dao: Arc<dyn DataAccess>, planner: Arc<dyn PlanProvider>, html: &str) -> DirectoryTaskDeps {
        let executor = Arc::new(SubmissionExecutor::new(
            Arc::new(HtmlDriver { html: html.to_string() }),
            Arc::new(NoopFormMapper),
            dao.clone(),
            "worker-test",
            "default",
        ));
        DirectoryTaskDeps::new(
            dao,
            planner,
            executor,
            Arc::new(NoopDescriptionCustomizer),
            Arc::new(NoopAbTestAssigner),
            Arc::new(NoopRetryAnalyzer),
            "worker-test",
        )
        .with_retry_delay(Duration::from_millis(5))
        .with_per_attempt_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn duplicate_preflight_short_circuits_to_skipped() {
        let dao = Arc::new(FakeDao::duplicate(profile()));
        let planner = Arc::new(FakePlanner { plan: simple_plan() });
        let deps = deps_with(dao.clone(), planner, "<html>Thank you!</html>");

        let result = run_directory_task(&deps, Uuid::new_v4(), "yelp", JobPriority::Pro).await;

        assert_eq!(result.status, SubmissionStatus::Skipped);
        assert_eq!(dao.preflight_calls.load(Ordering::SeqCst), 1);
        assert!(dao.history.lock().unwrap().contains(&"skipped_duplicate".to_string()));
    }

    #[tokio::test]
    async fn missing_business_profile_is_not_retried() {
        let dao = Arc::new(FakeDao::not_found());
        let planner = Arc::new(FakePlanner { plan: simple_plan() });
        let deps = deps_with(dao.clone(), planner, "<html>Thank you!</html>");

        let result = run_directory_task(&deps, Uuid::new_v4(), "yelp", JobPriority::Pro).await;

        assert_eq!(result.status, SubmissionStatus::Failed);
        assert!(dao.history.lock().unwrap().contains(&"error_no_profile".to_string()));
    }

    #[tokio::test]
    async fn executor_failure_exhausts_retry_budget_then_fails() {
        let dao = Arc::new(FakeDao::with_profile(profile()));
        let planner = Arc::new(FakePlanner { plan: simple_plan() });
        let deps = deps_with(dao.clone(), planner, "<html>an error occurred</html>");

        let result = run_directory_task(&deps, Uuid::new_v4(), "yelp", JobPriority::Pro).await;

        assert_eq!(result.status, SubmissionStatus::Failed);
        assert_eq!(dao.preflight_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn successful_submission_returns_submitted() {
        let dao = Arc::new(FakeDao::with_profile(profile()));
        let planner = Arc::new(FakePlanner { plan: simple_plan() });
        let deps = deps_with(dao, planner, "<html>Your listing was received!</html>");

        let result = run_directory_task(&deps, Uuid::new_v4(), "yelp", JobPriority::Enterprise).await;

        assert_eq!(result.status, SubmissionStatus::Submitted);
    }

    #[tokio::test]
    async fn empty_directory_fails_without_any_attempt() {
        let dao = Arc::new(FakeDao::with_profile(profile()));
        let planner = Arc::new(FakePlanner { plan: simple_plan() });
        let deps = deps_with(dao.clone(), planner, "<html>Thank you!</html>");

        let result = run_directory_task(&deps, Uuid::new_v4(), "   ", JobPriority::Pro).await;

        assert_eq!(result.status, SubmissionStatus::Failed);
        assert_eq!(dao.preflight_calls.load(Ordering::SeqCst), 0);
    }
}
