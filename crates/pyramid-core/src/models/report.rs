use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Human-review report accumulated during a build.
///
/// Quality-degradation conditions land here instead of aborting the build:
/// unresolved conflicts, budget exhaustion, deferred clusters, and operations
/// where dedup found nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewReport {
    /// When the build producing this report ran.
    pub generated_at: DateTime<Utc>,
    pub items: Vec<ReviewItem>,
}

impl ReviewReport {
    pub fn new(items: Vec<ReviewItem>) -> Self {
        Self {
            generated_at: Utc::now(),
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items of one kind, in build order.
    pub fn items_of(&self, kind: ReviewKind) -> impl Iterator<Item = &ReviewItem> {
        self.items.iter().filter(move |i| i.kind == kind)
    }
}

/// One reviewable condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub kind: ReviewKind,
    /// Cluster the item concerns, when applicable.
    pub cluster_id: Option<String>,
    /// What happened and why it needs a human.
    pub detail: String,
    /// Affected example ids.
    pub example_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    /// A flagged conflict that could not be resolved (provider failure or
    /// exhausted budget). The cluster was force-assigned to edge tier.
    UnresolvedConflict,
    /// The external merge call failed or timed out for this cluster.
    MergeFailed,
    /// The merge budget ran out before this cluster's turn.
    BudgetExhausted,
    /// The caller deferred this cluster from the auto-merge path.
    Deferred,
    /// Dedup found nothing for this operation (mention count equals entry
    /// count). A validation signal, not an error.
    ZeroDedup,
}

/// Build statistics, reported alongside the pyramid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStats {
    /// Raw input example count.
    pub original_count: usize,
    /// Layer-3 entry count after dedup.
    pub entry_count: usize,
    /// Fraction of examples removed by merging, in [0, 1].
    pub dedup_ratio: f64,
    /// Total cluster count, including singletons.
    pub cluster_count: usize,
    /// Clusters with exactly one member.
    pub singleton_clusters: usize,
    /// Clusters with two or more members.
    pub multi_member_clusters: usize,
    /// Largest cluster size.
    pub max_cluster_size: usize,
    /// External merge calls actually made.
    pub merge_calls_used: usize,
    /// The configured budget, if one was set.
    pub merge_budget: Option<usize>,
}

impl BuildStats {
    /// Dedup ratio from raw and deduplicated counts.
    pub fn ratio(original: usize, merged: usize) -> f64 {
        if original == 0 {
            0.0
        } else {
            (original - merged) as f64 / original as f64
        }
    }
}
