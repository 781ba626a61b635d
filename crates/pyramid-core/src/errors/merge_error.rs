/// Failures from the external AI-merge collaborator.
///
/// None of these abort a build: the canonicalizer catches them, force-assigns
/// the cluster to edge tier with the conflict retained, and records the
/// failure in the review report.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("external merge budget exhausted ({budget} calls)")]
    BudgetExhausted { budget: usize },

    #[error("merge provider failed for cluster {cluster_id}: {reason}")]
    ProviderFailed { cluster_id: String, reason: String },

    #[error("merge provider timed out for cluster {cluster_id}")]
    Timeout { cluster_id: String },
}
