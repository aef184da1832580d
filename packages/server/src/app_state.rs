//! Shared dependency bundle, built once at process start and handed to
//! whichever binary needs it. Assembled once in `main` and passed to
//! every axum handler and background worker, the same way `ServerDeps`
//! is wired up elsewhere in this codebase.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use submission_advisors::noop::{
    NoopAbTestAssigner, NoopDescriptionCustomizer, NoopFormMapper, NoopProbabilityRanker,
    NoopRetryAnalyzer,
};
use submission_core::PipelineConfig;
use submission_db::{DataAccess, PostgresDataAccess};
use submission_executor::{SubmissionExecutor, UnconfiguredDriver};
use submission_pipeline::{DirectoryTaskDeps, JobFlowDeps};
use submission_planner::{HttpPlanProvider, PlanProvider};
use submission_queue::{AwsSqsTransport, QueueTransport};

use crate::auth::AuthTokens;

const WORKER_QUEUE_NAME: &str = "submission-pipeline";

pub struct AppState {
    pub config: PipelineConfig,
    pub pool: PgPool,
    pub dao: Arc<dyn DataAccess>,
    pub transport: Arc<dyn QueueTransport>,
    pub flow_deps: Arc<JobFlowDeps>,
    pub auth_tokens: AuthTokens,
}

impl AppState {
    pub async fn build(worker_id: &str) -> Result<Self> {
        let config = PipelineConfig::from_env().context("failed to load pipeline configuration")?;

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .context("failed to connect to database")?;

        let dao: Arc<dyn DataAccess> = Arc::new(PostgresDataAccess::new(pool.clone()));
        let transport: Arc<dyn QueueTransport> = Arc::new(AwsSqsTransport::from_env().await);

        let planner: Arc<dyn PlanProvider> = Arc::new(HttpPlanProvider::new(
            config.planner_url.clone(),
            Duration::from_secs(config.planner_timeout_sec),
        ));

        let executor = Arc::new(SubmissionExecutor::new(
            Arc::new(UnconfiguredDriver),
            Arc::new(NoopFormMapper),
            dao.clone(),
            worker_id,
            WORKER_QUEUE_NAME,
        ));

        let task_deps = Arc::new(DirectoryTaskDeps::new(
            dao.clone(),
            planner,
            executor,
            Arc::new(NoopDescriptionCustomizer),
            Arc::new(NoopAbTestAssigner),
            Arc::new(NoopRetryAnalyzer),
            worker_id,
        ));

        let flow_deps = Arc::new(JobFlowDeps {
            dao: dao.clone(),
            ranker: Arc::new(NoopProbabilityRanker),
            task_deps,
            max_concurrent_directories: config.max_concurrent_directories,
        });

        Ok(Self { config, pool, dao, transport, flow_deps, auth_tokens: AuthTokens::from_env() })
    }
}
