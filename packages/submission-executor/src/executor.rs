//! C4: submission executor. Executes a plan through a [`BrowserDriver`],
//! always spawning a [`HeartbeatHandle`] for the run's lifetime and always
//! producing an [`Outcome`] — grounded on
//! `original_source/backend/workers/submission_runner.py::_run_plan_async`,
//! whose top-level `try/except` never propagates: every path, success or
//! exception, returns a result dict with `status`, `duration_ms`, and a
//! `response_log`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use submission_advisors::{FieldMapping, FormMapper};
use submission_core::{BusinessProfile, Plan, PlanAction, PlanStep, SubmissionStatus};
use submission_db::DataAccess;
use tracing::{info, warn};
use uuid::Uuid;

use crate::driver::{BrowserDriver, PageSnapshot};
use crate::heartbeat::HeartbeatHandle;

const STEP_DELAY: Duration = Duration::from_millis(500);
const SUCCESS_INDICATORS: &[&str] = &["success", "thank you", "submitted", "received"];

#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: SubmissionStatus,
    pub duration_ms: u64,
    pub response_log: serde_json::Value,
    pub error_message: Option<String>,
    pub listing_url: Option<String>,
}

pub struct SubmissionExecutor {
    driver: Arc<dyn BrowserDriver>,
    form_mapper: Arc<dyn FormMapper>,
    dao: Arc<dyn DataAccess>,
    worker_id: String,
    queue_name: String,
}

impl SubmissionExecutor {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        form_mapper: Arc<dyn FormMapper>,
        dao: Arc<dyn DataAccess>,
        worker_id: impl Into<String>,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            form_mapper,
            dao,
            worker_id: worker_id.into(),
            queue_name: queue_name.into(),
        }
    }

    pub async fn run_plan(
        &self,
        job_id: Uuid,
        directory: &str,
        plan: &Plan,
        business: &BusinessProfile,
    ) -> Outcome {
        let mut heartbeat = HeartbeatHandle::start(
            self.dao.clone(),
            self.worker_id.clone(),
            self.queue_name.clone(),
            job_id,
            directory,
        );

        let started = Instant::now();
        let result = self.run_plan_inner(directory, plan, business).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        heartbeat.finish().await;

        match result {
            Ok((status, response_log, listing_url)) => {
                let error_message = if status == SubmissionStatus::Failed {
                    Some("no success indicators".to_string())
                } else {
                    None
                };
                Outcome {
                    status,
                    duration_ms,
                    response_log,
                    error_message,
                    listing_url,
                }
            }
            Err(e) => {
                warn!(directory, error = %e, "submission execution failed");
                Outcome {
                    status: SubmissionStatus::Failed,
                    duration_ms,
                    response_log: serde_json::json!({"error": e.to_string()}),
                    error_message: Some(e.to_string()),
                    listing_url: None,
                }
            }
        }
    }

    async fn run_plan_inner(
        &self,
        directory: &str,
        plan: &Plan,
        business: &BusinessProfile,
    ) -> Result<(SubmissionStatus, serde_json::Value, Option<String>), crate::driver::DriverError>
    {
        self.driver.launch().await?;

        let steps = self.resolve_steps(plan, business).await;
        info!(directory, step_count = steps.len(), "executing submission plan");

        for (i, step) in steps.iter().enumerate() {
            info!(directory, step = i + 1, total = steps.len(), action = ?step.action, "executing step");
            self.driver.execute_step(step).await?;
            tokio::time::sleep(STEP_DELAY).await;
        }

        let PageSnapshot { url, html } = self.driver.screenshot_and_content().await?;
        self.driver.close().await?;

        let lower = html.to_lowercase();
        let is_success = SUCCESS_INDICATORS.iter().any(|ind| lower.contains(ind));

        let status = if is_success {
            SubmissionStatus::Submitted
        } else {
            SubmissionStatus::Failed
        };

        let response_log = serde_json::json!({
            "final_url": url,
            "steps_executed": steps.len(),
            "success_indicators_found": is_success,
        });

        Ok((status, response_log, Some(url)))
    }

    /// Derives fill steps from the form-mapping advisor when the plan has
    /// none of its own; otherwise the plan is used as given.
    async fn resolve_steps(&self, plan: &Plan, business: &BusinessProfile) -> Vec<PlanStep> {
        let has_fill = plan
            .plan
            .iter()
            .any(|s| matches!(s.action, PlanAction::Fill) && s.selector.is_some());

        if has_fill {
            return plan.plan.clone();
        }

        let snapshot = self.driver.screenshot_and_content().await.ok();
        let html = snapshot.map(|s| s.html).unwrap_or_default();

        match self.form_mapper.map_fields(&html, business).await {
            Ok(mapping) if !mapping.is_empty() => {
                let derived = derive_fill_steps(&mapping, business);
                info!(count = derived.len(), "form mapper derived fill steps");
                let mut combined = derived;
                combined.extend(
                    plan.plan
                        .iter()
                        .filter(|s| !matches!(s.action, PlanAction::Fill))
                        .cloned(),
                );
                combined
            }
            Ok(_) => plan.plan.clone(),
            Err(e) => {
                warn!(error = %e, "form mapping failed, proceeding with plan as given");
                plan.plan.clone()
            }
        }
    }
}

fn derive_fill_steps(mapping: &[FieldMapping], business: &BusinessProfile) -> Vec<PlanStep> {
    let value_for = |field: &str| -> Option<String> {
        match field {
            "businessName" => Some(business.business_name.clone()),
            "email" => Some(business.email.clone()),
            "website" => Some(business.website.clone()),
            "description" => Some(business.description.clone()),
            "phone" => Some(business.phone.clone()),
            _ => None,
        }
    };

    mapping
        .iter()
        .filter_map(|m| {
            let value = value_for(&m.field)?;
            if value.is_empty() {
                return None;
            }
            Some(PlanStep {
                action: PlanAction::Fill,
                url: None,
                selector: Some(m.selector.clone()),
                value: Some(value),
                until: None,
                seconds: None,
            })
        })
        .collect()
}
