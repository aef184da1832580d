//! No-op defaults so the pipeline compiles and runs without any advisor
//! wired in. Each impl is the unadvised path made explicit rather than
//! an `Option<dyn Trait>` threaded everywhere.

use async_trait::async_trait;
use submission_core::BusinessProfile;

use crate::traits::{
    AbTestAssigner, AbVariant, DescriptionCustomizer, FieldMapping, FormMapper, ProbabilityRanker,
    RetryAnalyzer, RetryRecommendation,
};
use crate::AdvisorError;

pub struct NoopFormMapper;

#[async_trait]
impl FormMapper for NoopFormMapper {
    async fn map_fields(
        &self,
        _page_html: &str,
        _profile: &BusinessProfile,
    ) -> Result<Vec<FieldMapping>, AdvisorError> {
        Ok(Vec::new())
    }
}

pub struct NoopDescriptionCustomizer;

#[async_trait]
impl DescriptionCustomizer for NoopDescriptionCustomizer {
    async fn customize(
        &self,
        _directory: &str,
        original_description: &str,
    ) -> Result<String, AdvisorError> {
        Ok(original_description.to_string())
    }
}

pub struct NoopAbTestAssigner;

#[async_trait]
impl AbTestAssigner for NoopAbTestAssigner {
    async fn assign(&self, _job_id: &str, _directory: &str) -> Result<AbVariant, AdvisorError> {
        Ok(AbVariant::Control)
    }
}

pub struct NoopRetryAnalyzer;

#[async_trait]
impl RetryAnalyzer for NoopRetryAnalyzer {
    async fn analyze_failure(
        &self,
        _directory: &str,
        _error_message: &str,
        _attempt: u32,
    ) -> Result<RetryRecommendation, AdvisorError> {
        Ok(RetryRecommendation {
            should_retry: true,
            probability: 0.5,
            reasoning: "no advisor configured".to_string(),
        })
    }
}

pub struct NoopProbabilityRanker;

#[async_trait]
impl ProbabilityRanker for NoopProbabilityRanker {
    async fn rank(
        &self,
        _profile: &BusinessProfile,
        directories: &[String],
    ) -> Result<Vec<String>, AdvisorError> {
        Ok(directories.to_vec())
    }
}
