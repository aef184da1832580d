//! Optional AI advisors, treated as capability-typed collaborators behind
//! narrow interfaces: a plan-ordering advisor, a content rewriter, a retry
//! advisor, and an A/B assigner. Every trait ships a no-op default so the
//! pipeline compiles and runs without any of them, and every call site
//! degrades to the unadvised path on `Err`.

pub mod noop;
pub mod traits;

pub use noop::{
    NoopAbTestAssigner, NoopDescriptionCustomizer, NoopFormMapper, NoopProbabilityRanker,
    NoopRetryAnalyzer,
};
pub use traits::{
    AbTestAssigner, AbVariant, DescriptionCustomizer, FieldMapping, FormMapper, ProbabilityRanker,
    RetryAnalyzer, RetryRecommendation,
};

#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("advisor call failed: {0}")]
    Failed(String),
}
