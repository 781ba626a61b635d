use serde::{Deserialize, Serialize};

use super::defaults;
use crate::errors::ConfigError;

/// Pipeline configuration: clustering and tiering thresholds plus the
/// external-merge resource limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum pairwise similarity joining two examples into one cluster.
    pub edge_threshold: f64,
    /// Cluster average similarity floor for the variant tier.
    pub variant_threshold: f64,
    /// Cluster average similarity floor for the canonical tier.
    pub canonical_threshold: f64,
    /// Minimum member count for a multi-example cluster.
    pub min_cluster_size: usize,
    /// Member count at which merging always delegates to the external AI
    /// collaborator instead of the mechanical path.
    pub max_mechanical_size: usize,
    /// Hard cap on external AI-merge calls per build. `None` = unlimited.
    pub merge_budget: Option<usize>,
    /// Worker count for parallel cluster canonicalization.
    pub merge_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            edge_threshold: defaults::DEFAULT_EDGE_THRESHOLD,
            variant_threshold: defaults::DEFAULT_VARIANT_THRESHOLD,
            canonical_threshold: defaults::DEFAULT_CANONICAL_THRESHOLD,
            min_cluster_size: defaults::DEFAULT_MIN_CLUSTER_SIZE,
            max_mechanical_size: defaults::DEFAULT_MAX_MECHANICAL_SIZE,
            merge_budget: None,
            merge_workers: defaults::DEFAULT_MERGE_WORKERS,
        }
    }
}

impl PipelineConfig {
    /// Validate the configuration. Called at pipeline start, before any
    /// example is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("edge_threshold", self.edge_threshold),
            ("variant_threshold", self.variant_threshold),
            ("canonical_threshold", self.canonical_threshold),
        ] {
            if !(-1.0..=1.0).contains(&value) || value.is_nan() {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        if self.edge_threshold > self.variant_threshold
            || self.variant_threshold > self.canonical_threshold
        {
            return Err(ConfigError::ThresholdOrdering {
                edge: self.edge_threshold,
                variant: self.variant_threshold,
                canonical: self.canonical_threshold,
            });
        }
        if self.min_cluster_size < 1 {
            return Err(ConfigError::MinClusterSizeZero);
        }
        if self.merge_workers < 1 {
            return Err(ConfigError::NoMergeWorkers);
        }
        Ok(())
    }
}
