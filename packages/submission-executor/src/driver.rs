//! `BrowserDriver`: the out-of-scope browser-automation collaborator
//! boundary, shaped like `intelligent-crawler::traits::PageFetcher` —
//! async-trait, a narrow typed surface, one associated error type.

use async_trait::async_trait;
use submission_core::PlanStep;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("browser session failed: {0}")]
    SessionFailed(String),

    #[error("step execution failed: {0}")]
    StepFailed(String),
}

#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

/// A single sandboxed browser session. `launch` and `close` bracket the
/// session's lifetime; `execute_step` advances one `PlanStep` at a time.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch(&self) -> Result<(), DriverError>;

    async fn execute_step(&self, step: &PlanStep) -> Result<(), DriverError>;

    async fn screenshot_and_content(&self) -> Result<PageSnapshot, DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// Placeholder [`BrowserDriver`] for deployments that haven't wired in a
/// real browser-automation backend yet. Every call fails with
/// [`DriverError::SessionFailed`], which `SubmissionExecutor::run_plan`
/// turns into an ordinary failed [`Outcome`](crate::executor::Outcome) —
/// the task retries and eventually fails the directory rather than
/// panicking the worker. Operators swap this for a real driver at the
/// `AppState` construction point.
pub struct UnconfiguredDriver;

#[async_trait]
impl BrowserDriver for UnconfiguredDriver {
    async fn launch(&self) -> Result<(), DriverError> {
        Err(DriverError::SessionFailed("no browser driver configured".to_string()))
    }

    async fn execute_step(&self, _step: &PlanStep) -> Result<(), DriverError> {
        Err(DriverError::SessionFailed("no browser driver configured".to_string()))
    }

    async fn screenshot_and_content(&self) -> Result<PageSnapshot, DriverError> {
        Err(DriverError::SessionFailed("no browser driver configured".to_string()))
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}
