//! Phase 2: Canonicalization — per-cluster merge decisions.
//!
//! Mechanical path for near-identical small clusters, delegation to the
//! external AI-merge collaborator for everything that genuinely differs,
//! standalone cataloguing for low-similarity groups. Clusters are
//! independent after phase 1, so decisions run in parallel.

use pyramid_core::config::PipelineConfig;
use pyramid_core::errors::{PyramidError, PyramidResult};
use pyramid_core::example::Example;
use pyramid_core::models::{
    Conflict, ConflictKind, MergeOutcome, MergePath, ProvenanceNote, ReviewItem, ReviewKind,
};
use pyramid_core::traits::IMergeProvider;
use rayon::prelude::*;
use tracing::debug;

use super::phase1_clustering::ClusterDraft;
use super::BuildOptions;
use crate::algorithms::SimilarityIndex;
use crate::budget::MergeBudget;

/// A cluster after its merge decision.
#[derive(Debug, Clone)]
pub struct CanonicalizedCluster {
    pub cluster: pyramid_core::models::Cluster,
    pub member_idx: Vec<usize>,
    pub units: Vec<Vec<usize>>,
    /// Which path the decision took.
    pub path: MergePath,
    /// The merged body, for paths that produced one.
    pub canonical_text: Option<String>,
    /// Decision paper trail.
    pub provenance: ProvenanceNote,
    /// Retained conflict descriptions and collaborator notes.
    pub notes: Option<String>,
}

impl CanonicalizedCluster {
    /// Merged paths produce a single Layer-3 entry; unmerged paths produce
    /// one entry per exact-duplicate unit.
    pub fn is_merged(&self) -> bool {
        self.canonical_text.is_some()
    }
}

/// Canonicalize every cluster, in parallel up to the configured worker count.
///
/// Cluster order in the output matches the input; review items follow
/// cluster order.
pub fn canonicalize_clusters(
    drafts: Vec<ClusterDraft>,
    examples: &[Example],
    index: &SimilarityIndex<'_>,
    merger: &dyn IMergeProvider,
    budget: &MergeBudget,
    config: &PipelineConfig,
    options: &BuildOptions,
) -> PyramidResult<(Vec<CanonicalizedCluster>, Vec<ReviewItem>)> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.merge_workers)
        .build()
        .map_err(|e| PyramidError::WorkerPool(e.to_string()))?;

    let results: Vec<PyramidResult<(CanonicalizedCluster, Vec<ReviewItem>)>> = pool.install(|| {
        drafts
            .into_par_iter()
            .map(|draft| canonicalize_one(draft, examples, index, merger, budget, config, options))
            .collect()
    });

    let mut clusters = Vec::with_capacity(results.len());
    let mut review = Vec::new();
    for result in results {
        let (cluster, mut items) = result?;
        review.append(&mut items);
        clusters.push(cluster);
    }
    Ok((clusters, review))
}

fn canonicalize_one(
    draft: ClusterDraft,
    examples: &[Example],
    index: &SimilarityIndex<'_>,
    merger: &dyn IMergeProvider,
    budget: &MergeBudget,
    config: &PipelineConfig,
    options: &BuildOptions,
) -> PyramidResult<(CanonicalizedCluster, Vec<ReviewItem>)> {
    let ClusterDraft {
        mut cluster,
        member_idx,
        units,
    } = draft;

    let canonical_idx = select_canonical(&member_idx, index)?;
    cluster.canonical_id = examples[canonical_idx].id.clone();

    let mut review = Vec::new();
    let had_conflicts = cluster.has_conflicts();

    // Caller-deferred clusters skip the auto-merge path entirely; they are
    // held at best-known tier and resolved on a later run.
    if options.deferred.contains(&cluster.id) {
        debug!(cluster = %cluster.id, "cluster deferred by caller");
        review.push(ReviewItem {
            kind: ReviewKind::Deferred,
            cluster_id: Some(cluster.id.clone()),
            detail: "removed from the auto-merge path by the caller".to_string(),
            example_ids: cluster.members.clone(),
        });
        let provenance = note(&cluster, MergePath::Deferred, true, Some("deferred by caller"));
        return Ok((
            CanonicalizedCluster {
                cluster,
                member_idx,
                units,
                path: MergePath::Deferred,
                canonical_text: None,
                provenance,
                notes: None,
            },
            review,
        ));
    }

    // A decision carried over from a previous run's review resolves the
    // cluster without a new external call.
    if let Some(outcome) = options.resolved.get(&cluster.id) {
        debug!(cluster = %cluster.id, "applying pre-resolved merge outcome");
        return Ok(apply_outcome(
            cluster,
            member_idx,
            units,
            outcome.clone(),
            MergePath::Resolved,
            review,
        ));
    }

    let avg = cluster.avg_similarity.value();
    let size = cluster.len();

    // Decision table. Conflicts always force the delegated path; the engine
    // never resolves a semantic disagreement itself.
    if !had_conflicts && avg >= config.canonical_threshold && size < config.max_mechanical_size {
        // Mechanical merge: canonical stands alone, the rest are recorded as
        // pure duplicates.
        let duplicates = size - 1;
        let provenance = note(
            &cluster,
            MergePath::Mechanical,
            true,
            Some(&format!("{duplicates} pure duplicates folded into the canonical")),
        );
        let canonical_text = examples[canonical_idx].raw_text.clone();
        debug!(cluster = %cluster.id, duplicates, "mechanical merge");
        return Ok((
            CanonicalizedCluster {
                cluster,
                member_idx,
                units,
                path: MergePath::Mechanical,
                canonical_text: Some(canonical_text),
                provenance,
                notes: None,
            },
            review,
        ));
    }

    let needs_external =
        had_conflicts || size >= config.max_mechanical_size || avg >= config.variant_threshold;

    if !needs_external {
        // Low similarity, small cluster: keep every member standalone.
        let provenance = note(&cluster, MergePath::Standalone, true, None);
        return Ok((
            CanonicalizedCluster {
                cluster,
                member_idx,
                units,
                path: MergePath::Standalone,
                canonical_text: None,
                provenance,
                notes: None,
            },
            review,
        ));
    }

    // External merge required: draw from the shared budget first.
    if !budget.try_acquire() {
        debug!(cluster = %cluster.id, "merge budget exhausted, forcing edge tier");
        cluster.conflicts.push(Conflict {
            description: "external merge required but the call budget was exhausted".to_string(),
            example_ids: cluster.members.clone(),
            kind: ConflictKind::BudgetExhausted,
        });
        review.push(ReviewItem {
            kind: ReviewKind::BudgetExhausted,
            cluster_id: Some(cluster.id.clone()),
            detail: "cluster needs an external merge; re-run with budget to resolve".to_string(),
            example_ids: cluster.members.clone(),
        });
        if had_conflicts {
            review.push(unresolved_conflict_item(&cluster));
        }
        let provenance = note(&cluster, MergePath::ForcedEdge, false, Some("merge budget exhausted"));
        return Ok((
            CanonicalizedCluster {
                cluster,
                member_idx,
                units,
                path: MergePath::ForcedEdge,
                canonical_text: None,
                provenance,
                notes: None,
            },
            review,
        ));
    }

    let members: Vec<&Example> = member_idx.iter().map(|&i| &examples[i]).collect();
    match merger.merge(&cluster, &members) {
        Ok(outcome) => {
            debug!(cluster = %cluster.id, resolved = outcome.conflicts_resolved, "delegated merge returned");
            let (canon, mut items) = apply_outcome(
                cluster,
                member_idx,
                units,
                outcome,
                MergePath::Delegated,
                review,
            );
            if canon.cluster.has_conflicts() {
                items.push(unresolved_conflict_item(&canon.cluster));
            }
            Ok((canon, items))
        }
        Err(err) => {
            debug!(cluster = %cluster.id, error = %err, "delegated merge failed, forcing edge tier");
            cluster.conflicts.push(Conflict {
                description: format!("external merge failed: {err}"),
                example_ids: cluster.members.clone(),
                kind: ConflictKind::MergeFailed,
            });
            review.push(ReviewItem {
                kind: ReviewKind::MergeFailed,
                cluster_id: Some(cluster.id.clone()),
                detail: err.to_string(),
                example_ids: cluster.members.clone(),
            });
            if had_conflicts {
                review.push(unresolved_conflict_item(&cluster));
            }
            let provenance = note(&cluster, MergePath::ForcedEdge, false, Some(&err.to_string()));
            Ok((
                CanonicalizedCluster {
                    cluster,
                    member_idx,
                    units,
                    path: MergePath::ForcedEdge,
                    canonical_text: None,
                    provenance,
                    notes: None,
                },
                review,
            ))
        }
    }
}

/// Most central member: highest mean similarity to the rest. `member_idx` is
/// source-ordered and the comparison is strict, so ties resolve to the
/// earliest source reference.
fn select_canonical(member_idx: &[usize], index: &SimilarityIndex<'_>) -> PyramidResult<usize> {
    let mut best = member_idx[0];
    let mut best_mean = f64::NEG_INFINITY;
    for &i in member_idx {
        let mean = index.mean_to(i, member_idx)?.value();
        if mean > best_mean {
            best = i;
            best_mean = mean;
        }
    }
    Ok(best)
}

fn apply_outcome(
    mut cluster: pyramid_core::models::Cluster,
    member_idx: Vec<usize>,
    units: Vec<Vec<usize>>,
    outcome: MergeOutcome,
    path: MergePath,
    review: Vec<ReviewItem>,
) -> (CanonicalizedCluster, Vec<ReviewItem>) {
    let mut notes = Vec::new();
    if !outcome.notes.is_empty() {
        notes.push(outcome.notes.clone());
    }

    if outcome.conflicts_resolved && cluster.has_conflicts() {
        // Resolved conflicts move into the notes; the description is kept,
        // only the active flag is lifted.
        for conflict in cluster.conflicts.drain(..) {
            notes.push(format!("resolved conflict: {}", conflict.description));
        }
    }

    let lossless = !cluster.has_conflicts();
    let provenance = note(&cluster, path, lossless, None);
    let joined = if notes.is_empty() {
        None
    } else {
        Some(notes.join("\n"))
    };

    (
        CanonicalizedCluster {
            cluster,
            member_idx,
            units,
            path,
            canonical_text: Some(outcome.canonical_text),
            provenance,
            notes: joined,
        },
        review,
    )
}

fn unresolved_conflict_item(cluster: &pyramid_core::models::Cluster) -> ReviewItem {
    let descriptions: Vec<&str> = cluster
        .conflicts
        .iter()
        .map(|c| c.description.as_str())
        .collect();
    ReviewItem {
        kind: ReviewKind::UnresolvedConflict,
        cluster_id: Some(cluster.id.clone()),
        detail: descriptions.join("; "),
        example_ids: cluster.members.clone(),
    }
}

fn note(
    cluster: &pyramid_core::models::Cluster,
    path: MergePath,
    lossless: bool,
    notes: Option<&str>,
) -> ProvenanceNote {
    ProvenanceNote {
        cluster_id: cluster.id.clone(),
        path,
        contributors: cluster.members.clone(),
        lossless,
        notes: notes.map(str::to_string),
    }
}
