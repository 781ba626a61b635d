//! Pipeline configuration.

mod pipeline_config;

pub use pipeline_config::PipelineConfig;

/// Default values for all tunable thresholds.
///
/// The 0.75 / 0.85 / 0.95 ladder comes from the knowledge-base design the
/// engine implements; they are configuration, not hard-coded constants, so
/// they can be tuned empirically.
pub mod defaults {
    /// Minimum pairwise similarity for two examples to share a cluster.
    pub const DEFAULT_EDGE_THRESHOLD: f64 = 0.75;
    /// Minimum cluster average similarity for the variant tier.
    pub const DEFAULT_VARIANT_THRESHOLD: f64 = 0.85;
    /// Minimum cluster average similarity for the canonical tier and for
    /// mechanical (no-AI) merging.
    pub const DEFAULT_CANONICAL_THRESHOLD: f64 = 0.95;
    /// Clusters smaller than this are broken into singleton outliers.
    pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 2;
    /// Clusters at or above this size always delegate to the external merger,
    /// even when their average similarity clears the canonical threshold.
    pub const DEFAULT_MAX_MECHANICAL_SIZE: usize = 5;
    /// Worker count for parallel cluster canonicalization.
    pub const DEFAULT_MERGE_WORKERS: usize = 4;
}
