//! Phase 1: Clustering — exact-hash grouping, then threshold-graph growth.
//!
//! Exact duplicates are atomic units that can never be split. Units are
//! visited in source order; a unit joins an existing cluster when its
//! similarity to any member unit reaches the edge threshold (chain
//! reachability). When several clusters qualify, it joins the one with the
//! highest mean similarity to existing members — hard single membership.

use std::collections::HashMap;

use pyramid_core::config::PipelineConfig;
use pyramid_core::errors::PyramidResult;
use pyramid_core::example::{Example, Similarity};
use pyramid_core::models::{Cluster, Conflict};
use tracing::debug;

use crate::algorithms::SimilarityIndex;

/// A cluster plus the index bookkeeping later phases need.
#[derive(Debug, Clone)]
pub struct ClusterDraft {
    pub cluster: Cluster,
    /// Member indexes into the input example slice, in source order.
    pub member_idx: Vec<usize>,
    /// Exact-duplicate units: groups of member indexes sharing a content
    /// hash, each in source order. Units are the atoms of unmerged entries.
    pub units: Vec<Vec<usize>>,
}

/// Partition the example set into clusters.
///
/// Guarantees: the union of all member sets equals the input set, with no
/// overlaps. Singletons with no neighbor above the threshold become their own
/// one-member outlier cluster — never dropped. `min_cluster_size` larger than
/// the input is a valid configuration that yields all-singletons.
pub fn cluster_examples(
    examples: &[Example],
    index: &SimilarityIndex<'_>,
    config: &PipelineConfig,
    known_conflicts: &[Conflict],
) -> PyramidResult<Vec<ClusterDraft>> {
    if examples.is_empty() {
        return Ok(Vec::new());
    }

    // Deterministic visiting order: source reference, then id.
    let mut order: Vec<usize> = (0..examples.len()).collect();
    order.sort_by(|&a, &b| {
        examples[a]
            .source_ref
            .cmp(&examples[b].source_ref)
            .then_with(|| examples[a].id.cmp(&examples[b].id))
    });

    // Exact-hash units, first-seen order. The hash check costs nothing and is
    // unambiguous, so it runs before any embedding is consulted.
    let mut unit_of_hash: HashMap<&str, usize> = HashMap::new();
    let mut units: Vec<Vec<usize>> = Vec::new();
    for &idx in &order {
        let hash = examples[idx].content_hash.as_str();
        match unit_of_hash.get(hash) {
            Some(&unit) => units[unit].push(idx),
            None => {
                unit_of_hash.insert(hash, units.len());
                units.push(vec![idx]);
            }
        }
    }
    debug!(
        examples = examples.len(),
        units = units.len(),
        "exact-hash grouping complete"
    );

    // Grow clusters over units. A unit's representative is its earliest
    // member; representatives carry the embedding comparisons.
    let mut clusters: Vec<Vec<usize>> = Vec::new(); // unit ids per cluster
    for unit in 0..units.len() {
        let rep = units[unit][0];

        let mut best: Option<(usize, f64)> = None;
        for (cluster_pos, cluster_units) in clusters.iter().enumerate() {
            let mut sims = Vec::with_capacity(cluster_units.len());
            let mut reachable = false;
            for &other in cluster_units {
                let sim = index.similarity(rep, units[other][0])?;
                if sim.value() >= config.edge_threshold {
                    reachable = true;
                }
                sims.push(sim);
            }
            if !reachable {
                continue;
            }
            let score = Similarity::mean(&sims).value();
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((cluster_pos, score)),
            }
        }

        match best {
            Some((cluster_pos, _)) => clusters[cluster_pos].push(unit),
            None => clusters.push(vec![unit]),
        }
    }

    // Enforce the minimum cluster size: undersized clusters are split back
    // into per-unit singleton outliers rather than dropped.
    let mut final_clusters: Vec<Vec<usize>> = Vec::new();
    for cluster_units in clusters {
        let member_count: usize = cluster_units.iter().map(|&u| units[u].len()).sum();
        if member_count >= config.min_cluster_size {
            final_clusters.push(cluster_units);
        } else {
            for &unit in &cluster_units {
                final_clusters.push(vec![unit]);
            }
        }
    }

    // Materialize cluster records.
    let mut drafts = Vec::with_capacity(final_clusters.len());
    for cluster_units in final_clusters {
        let mut member_idx: Vec<usize> = cluster_units
            .iter()
            .flat_map(|&u| units[u].iter().copied())
            .collect();
        member_idx.sort_by(|&a, &b| {
            examples[a]
                .source_ref
                .cmp(&examples[b].source_ref)
                .then_with(|| examples[a].id.cmp(&examples[b].id))
        });

        let members: Vec<String> = member_idx.iter().map(|&i| examples[i].id.clone()).collect();
        let avg_similarity = index.mean_pairwise(&member_idx)?;
        let id = Cluster::derive_id(&members);
        let conflicts = attach_conflicts(&members, known_conflicts);
        let outlier = members.len() == 1;
        let canonical_id = members[0].clone(); // refined in phase 2

        drafts.push(ClusterDraft {
            cluster: Cluster {
                id,
                members,
                canonical_id,
                avg_similarity,
                conflicts,
                outlier,
            },
            member_idx,
            units: cluster_units
                .iter()
                .map(|&u| units[u].clone())
                .collect(),
        });
    }

    Ok(drafts)
}

/// A known conflict applies to a cluster when every example it names landed
/// in that cluster; a disagreement across cluster boundaries is not a
/// same-cluster contradiction.
fn attach_conflicts(members: &[String], known: &[Conflict]) -> Vec<Conflict> {
    known
        .iter()
        .filter(|c| {
            !c.example_ids.is_empty() && c.example_ids.iter().all(|id| members.contains(id))
        })
        .cloned()
        .collect()
}
