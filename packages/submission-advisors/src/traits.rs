//! Narrow advisor traits, one per pipeline hook point. Shaped like
//! `intelligent-crawler::traits::PageEvaluator`: small, typed,
//! `Send + Sync`, returning a `Result` the caller is free to ignore.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use submission_core::BusinessProfile;

use crate::AdvisorError;

/// C4 fallback when a plan has no fill actions: maps business-profile
/// fields onto page selectors (`original_source/backend/AI/form_mapper.py`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field: String,
    pub selector: String,
    pub confidence: f64,
}

#[async_trait]
pub trait FormMapper: Send + Sync {
    async fn map_fields(
        &self,
        page_html: &str,
        profile: &BusinessProfile,
    ) -> Result<Vec<FieldMapping>, AdvisorError>;
}

/// C6 step 3: directory-specific rewrite of the business description.
/// Failures fall back to the original, unmodified description.
#[async_trait]
pub trait DescriptionCustomizer: Send + Sync {
    async fn customize(
        &self,
        directory: &str,
        original_description: &str,
    ) -> Result<String, AdvisorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbVariant {
    Control,
    Treatment,
}

/// C6 step 3: assigns a variant so downstream customization can branch.
#[async_trait]
pub trait AbTestAssigner: Send + Sync {
    async fn assign(&self, job_id: &str, directory: &str) -> Result<AbVariant, AdvisorError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryRecommendation {
    pub should_retry: bool,
    pub probability: f64,
    pub reasoning: String,
}

/// C6 step 11: advisory only — the task's own retry budget decides whether
/// another attempt actually happens.
#[async_trait]
pub trait RetryAnalyzer: Send + Sync {
    async fn analyze_failure(
        &self,
        directory: &str,
        error_message: &str,
        attempt: u32,
    ) -> Result<RetryRecommendation, AdvisorError>;
}

/// C7 step 4: reorders a job's directory list by predicted success
/// probability. Failures fall back to the original order.
#[async_trait]
pub trait ProbabilityRanker: Send + Sync {
    async fn rank(
        &self,
        profile: &BusinessProfile,
        directories: &[String],
    ) -> Result<Vec<String>, AdvisorError>;
}
