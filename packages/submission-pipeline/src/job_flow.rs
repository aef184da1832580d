//! C7: job flow. Fans a job out across its directories and finalizes the
//! job's status from the per-directory outcomes — grounded on
//! `original_source/backend/orchestration/flows.py::process_job` and
//! `tasks.py::finalize_job`, with the bounded-concurrency fan-out pattern
//! taken from `kernel/simple_scraper.rs` (a semaphore permit held across
//! each spawned task, collected afterwards).

use std::sync::Arc;

use submission_advisors::ProbabilityRanker;
use submission_core::{JobPriority, JobStatus};
use submission_db::DataAccess;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::directory_task::{run_directory_task, DirectoryResult, DirectoryTaskDeps};

pub struct JobFlowDeps {
    pub dao: Arc<dyn DataAccess>,
    pub ranker: Arc<dyn ProbabilityRanker>,
    pub task_deps: Arc<DirectoryTaskDeps>,
    pub max_concurrent_directories: usize,
}

#[derive(Debug, Clone)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub total: usize,
    pub submitted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub status: JobStatus,
    pub error_message: Option<String>,
}

pub async fn process_job(deps: &JobFlowDeps, job_id: Uuid, priority: JobPriority) -> JobSummary {
    let _ = deps
        .dao
        .record_history(job_id, None, "job_started", None, None)
        .await;

    if let Err(e) = deps.dao.set_job_status(job_id, JobStatus::InProgress, None).await {
        warn!(%job_id, error = %e, "failed to mark job in_progress");
    }

    let directories = match deps.dao.get_directories_for_job(job_id).await {
        Ok(dirs) => dirs,
        Err(e) => {
            warn!(%job_id, error = %e, "failed to list directories for job");
            return finalize(deps, job_id, &[]).await;
        }
    };

    if directories.is_empty() {
        return finalize(deps, job_id, &[]).await;
    }

    let ordered = match deps.dao.get_business_profile(job_id).await {
        Ok(profile) => match deps.ranker.rank(&profile, &directories).await {
            Ok(ranked) if ranked.len() == directories.len() => ranked,
            Ok(_) => directories.clone(),
            Err(e) => {
                warn!(%job_id, error = %e, "probability ranking failed, using original order");
                directories.clone()
            }
        },
        Err(e) => {
            warn!(%job_id, error = %e, "could not fetch business profile for ranking");
            directories.clone()
        }
    };

    let semaphore = Arc::new(Semaphore::new(deps.max_concurrent_directories.max(1)));
    let mut tasks: JoinSet<DirectoryResult> = JoinSet::new();

    for directory in ordered {
        let permit_src = semaphore.clone();
        let task_deps = deps.task_deps.clone();
        tasks.spawn(async move {
            let _permit = permit_src
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            run_directory_task(&task_deps, job_id, &directory, priority).await
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(join_err) => {
                warn!(%job_id, error = %join_err, "directory task panicked");
                results.push(DirectoryResult {
                    status: submission_core::SubmissionStatus::Failed,
                    directory: "unknown".to_string(),
                    duration_ms: 0,
                });
            }
        }
    }

    finalize(deps, job_id, &results).await
}

async fn finalize(deps: &JobFlowDeps, job_id: Uuid, results: &[DirectoryResult]) -> JobSummary {
    use submission_core::SubmissionStatus::*;

    let total = results.len();
    let submitted = results.iter().filter(|r| r.status == Submitted).count();
    let skipped = results.iter().filter(|r| r.status == Skipped).count();
    let failed = results.iter().filter(|r| r.status == Failed).count();

    let (status, error_message) = if total == 0 {
        (JobStatus::Failed, Some("no_results".to_string()))
    } else if failed == total {
        (JobStatus::Failed, Some("All submissions failed".to_string()))
    } else if submitted + skipped == total {
        (JobStatus::Completed, None)
    } else {
        (
            JobStatus::Completed,
            Some(format!("{failed} of {total} submissions failed")),
        )
    };

    if let Err(e) = deps
        .dao
        .set_job_status(job_id, status, error_message.as_deref())
        .await
    {
        warn!(%job_id, error = %e, "failed to record final job status");
    }

    let _ = deps
        .dao
        .record_history(
            job_id,
            None,
            "job_finalized",
            Some(serde_json::json!({
                "total": total,
                "submitted": submitted,
                "skipped": skipped,
                "failed": failed,
            })),
            None,
        )
        .await;

    info!(%job_id, total, submitted, skipped, failed, ?status, "job finalized");

    JobSummary {
        job_id,
        total,
        submitted,
        skipped,
        failed,
        status,
        error_message,
    }
}
