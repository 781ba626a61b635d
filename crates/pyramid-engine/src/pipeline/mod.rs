//! The 4-phase build pipeline.
//!
//! Phase 1 partitions examples into clusters, phase 2 decides a merge path
//! per cluster, phase 3 assigns tiers, phase 4 assembles and validates the
//! three-layer pyramid. Each phase is a pure function of the previous
//! phase's output plus configuration; the engine owns the shared state
//! (budget, similarity cache) and threads it through.

pub mod phase1_clustering;
pub mod phase2_canonicalization;
pub mod phase3_tiering;
pub mod phase4_assembly;

use std::collections::{HashMap, HashSet};

use pyramid_core::config::PipelineConfig;
use pyramid_core::errors::PyramidResult;
use pyramid_core::example::Example;
use pyramid_core::models::{BuildStats, Conflict, MergeOutcome, PyramidIndex, ReviewReport};
use pyramid_core::traits::IMergeProvider;
use tracing::info;

use crate::algorithms::SimilarityIndex;
use crate::budget::MergeBudget;

/// Caller-supplied knobs for one build, on top of the engine configuration.
///
/// `deferred` and `resolved` are keyed by cluster id. Cluster ids are derived
/// from sorted member ids, so a cluster that re-forms identically on a later
/// run keeps its id and the carried-over decisions still apply.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Clusters to hold out of the auto-merge path this run.
    pub deferred: HashSet<String>,
    /// Merge outcomes decided out of band (human review, a previous run),
    /// applied without a new external call.
    pub resolved: HashMap<String, MergeOutcome>,
    /// Known semantic disagreements between examples. A conflict attaches to
    /// the cluster that ends up containing every example it names.
    pub known_conflicts: Vec<Conflict>,
}

/// Run all four phases over an embedded example set.
pub fn run_pipeline(
    examples: &[Example],
    index: &SimilarityIndex<'_>,
    merger: &dyn IMergeProvider,
    budget: &MergeBudget,
    config: &PipelineConfig,
    options: &BuildOptions,
) -> PyramidResult<(PyramidIndex, ReviewReport, BuildStats)> {
    let drafts =
        phase1_clustering::cluster_examples(examples, index, config, &options.known_conflicts)?;
    let cluster_count = drafts.len();
    let singleton_clusters = drafts.iter().filter(|d| d.cluster.len() == 1).count();
    let max_cluster_size = drafts.iter().map(|d| d.cluster.len()).max().unwrap_or(0);
    info!(
        examples = examples.len(),
        clusters = cluster_count,
        singletons = singleton_clusters,
        "phase 1 complete"
    );

    let (canonicalized, mut review_items) = phase2_canonicalization::canonicalize_clusters(
        drafts, examples, index, merger, budget, config, options,
    )?;
    info!(
        merge_calls = budget.used(),
        review_items = review_items.len(),
        "phase 2 complete"
    );

    let tiered = phase3_tiering::tier_clusters(canonicalized, config);
    info!(clusters = tiered.len(), "phase 3 complete");

    let (pyramid, mut assembly_items) = phase4_assembly::assemble(&tiered, examples)?;
    review_items.append(&mut assembly_items);

    let stats = BuildStats {
        original_count: examples.len(),
        entry_count: pyramid.content.len(),
        dedup_ratio: BuildStats::ratio(examples.len(), pyramid.content.len()),
        cluster_count,
        singleton_clusters,
        multi_member_clusters: cluster_count - singleton_clusters,
        max_cluster_size,
        merge_calls_used: budget.used(),
        merge_budget: budget.limit(),
    };
    info!(
        entries = stats.entry_count,
        dedup_ratio = stats.dedup_ratio,
        "phase 4 complete"
    );

    Ok((pyramid, ReviewReport::new(review_items), stats))
}
