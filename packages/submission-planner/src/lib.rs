//! C3: plan provider client.
//!
//! Synchronous request-response over HTTP/JSON against the external
//! planning service, grounded on
//! `original_source/backend/brain/client.py::get_plan`'s shape — a typed
//! request, a 30s deadline, and exponential backoff with jitter retried up
//! to 3 attempts — translated to `reqwest` + `rand` in the style of
//! `openai-client::OpenAIClient`: one small `Client` wrapper, typed
//! request/response structs, no ad hoc JSON traversal.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use submission_core::{BusinessProfile, Plan};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("planner unavailable after retries: {0}")]
    PlanUnavailable(String),

    #[error("planner returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Serialize)]
struct PlanRequestBusiness {
    name: String,
    phone: String,
    address: String,
    city: String,
    state: String,
    zip: String,
    website: String,
    email: String,
    description: String,
    categories: Vec<String>,
}

#[derive(Debug, Serialize, Default)]
struct PlanRequestHints {
    #[serde(rename = "lastKnownFields")]
    last_known_fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct PlanRequest {
    directory: String,
    business: PlanRequestBusiness,
    hints: PlanRequestHints,
}

impl PlanRequest {
    fn new(directory: &str, business: &BusinessProfile) -> Self {
        Self {
            directory: directory.to_string(),
            business: PlanRequestBusiness {
                name: business.business_name.clone(),
                phone: business.phone.clone(),
                address: business.address.clone(),
                city: business.city.clone(),
                state: business.state.clone(),
                zip: business.zip.clone(),
                website: business.website.clone(),
                email: business.email.clone(),
                description: business.description.clone(),
                categories: vec![business.category.clone()],
            },
            hints: PlanRequestHints::default(),
        }
    }
}

#[async_trait]
pub trait PlanProvider: Send + Sync {
    async fn get_plan(
        &self,
        directory: &str,
        business: &BusinessProfile,
    ) -> Result<Plan, PlannerError>;
}

/// HTTP implementation talking to `PLANNER_URL`.
pub struct HttpPlanProvider {
    client: reqwest::Client,
    base_url: String,
    max_attempts: u32,
}

impl HttpPlanProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client builds with a fixed timeout"),
            base_url: base_url.into(),
            max_attempts: 3,
        }
    }

    /// `base * 2^attempt` capped, ±25% jitter, matching
    /// `utils/retry.py::exponential_backoff_with_jitter`.
    fn backoff_delay(attempt: u32) -> Duration {
        use rand::Rng;
        let base_ms = 1000f64;
        let max_ms = 10_000f64;
        let delay = (base_ms * 2f64.powi(attempt as i32)).min(max_ms);
        let jitter_range = delay * 0.25;
        let jittered = delay + rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

#[async_trait]
impl PlanProvider for HttpPlanProvider {
    async fn get_plan(
        &self,
        directory: &str,
        business: &BusinessProfile,
    ) -> Result<Plan, PlannerError> {
        let request = PlanRequest::new(directory, business);
        let url = format!("{}/plan", self.base_url);

        let mut last_error = String::new();
        for attempt in 0..self.max_attempts {
            let response = self.client.post(&url).json(&request).send().await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<Plan>()
                        .await
                        .map_err(|e| PlannerError::InvalidResponse(e.to_string()));
                }
                Ok(resp) => {
                    last_error = format!("planner returned status {}", resp.status());
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt + 1 < self.max_attempts {
                let delay = Self::backoff_delay(attempt);
                warn!(directory, attempt, delay_ms = delay.as_millis() as u64, "plan fetch failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }

        info!(directory, attempts = self.max_attempts, "plan fetch exhausted retry budget");
        Err(PlannerError::PlanUnavailable(last_error))
    }
}
