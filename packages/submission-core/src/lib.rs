//! Domain model, idempotency keyer, configuration, and error kinds shared
//! by every crate in the submission pipeline.

pub mod config;
pub mod error;
pub mod idempotency;
pub mod models;

pub use config::PipelineConfig;
pub use error::{FailureKind, PipelineError};
pub use idempotency::idempotency_key;
pub use models::{
    BusinessProfile, CaptchaHint, DirectoryInfo, DirectorySubmission, HistoryEvent, Job,
    JobPriority, JobStatus, Plan, PlanAction, PlanConstraints, PlanStep, SubmissionStatus,
    UpsertOutcome, WorkerHeartbeat,
};
