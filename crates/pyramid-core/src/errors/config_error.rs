/// Invalid pipeline configuration. Raised at pipeline start, before any
/// example is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} = {value} is outside the similarity range [-1.0, 1.0]")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("min_cluster_size must be >= 1")]
    MinClusterSizeZero,

    #[error(
        "thresholds must be ordered edge <= variant <= canonical \
         (got edge={edge}, variant={variant}, canonical={canonical})"
    )]
    ThresholdOrdering {
        edge: f64,
        variant: f64,
        canonical: f64,
    },

    #[error("merge_workers must be >= 1")]
    NoMergeWorkers,
}
