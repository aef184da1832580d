//! Error kinds shared across the pipeline.
//!
//! Mirrors `kernel/jobs/job.rs::ErrorKind` / `seesaw::FailureKind`'s
//! retryable/non-retryable split: each leaf error classifies itself so the
//! directory-task retry loop (submission-pipeline) can decide without
//! downcasting.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient: retry until the task-level budget is exhausted.
    Retryable,
    /// Permanent: do not retry (validation, not-found).
    NonRetryable,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("transient remote failure: {0}")]
    TransientRemote(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("executor failure: {0}")]
    ExecutorFailure(String),
}

impl PipelineError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            PipelineError::Validation(_) | PipelineError::NotFound(_) => FailureKind::NonRetryable,
            PipelineError::TransientRemote(_) | PipelineError::ExecutorFailure(_) => {
                FailureKind::Retryable
            }
        }
    }
}
