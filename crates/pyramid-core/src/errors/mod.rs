//! Error taxonomy for the Pyramid engine.
//!
//! Data-integrity errors (`MissingEmbedding`, `Completeness`) abort the
//! current build — a silently incomplete pyramid is worse than a loud
//! failure. Quality-degradation conditions (merge budget exhaustion,
//! collaborator failures) never surface here; they degrade the affected
//! cluster to edge tier and flow into the review report instead.

mod config_error;
mod merge_error;

pub use config_error::ConfigError;
pub use merge_error::MergeError;

/// Convenience result alias used across the workspace.
pub type PyramidResult<T> = Result<T, PyramidError>;

/// Top-level error type aggregating all subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum PyramidError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("example {example_id} reached similarity computation without an embedding")]
    MissingEmbedding { example_id: String },

    #[error(transparent)]
    Completeness(#[from] CompletenessError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("a build is already in progress on this engine")]
    BuildInProgress,

    #[error("embedding provider {provider} failed: {reason}")]
    EmbeddingProviderFailed { provider: String, reason: String },

    #[error("failed to start canonicalization worker pool: {0}")]
    WorkerPool(String),
}

/// Pyramid builder validation failure: some example ids were lost or
/// duplicated between input and the Layer-3 content. Always fatal to the
/// build; a partial pyramid is never emitted.
#[derive(Debug, thiserror::Error)]
#[error("pyramid completeness violated ({detail}): {} missing, {} duplicated", missing.len(), duplicated.len())]
pub struct CompletenessError {
    /// Input example ids absent from Layer 3.
    pub missing: Vec<String>,
    /// Example ids appearing in more than one Layer-3 entry.
    pub duplicated: Vec<String>,
    /// Which validation check failed.
    pub detail: String,
}
