//! Phase 3: Tier assignment — a pure function of cluster statistics.
//!
//! Rule table, first match wins:
//! 1. conflicts present            → edge
//! 2. avg >= canonical, size >= 2  → canonical
//! 3. avg >= variant               → variant
//! 4. otherwise                    → edge

use pyramid_core::config::PipelineConfig;
use pyramid_core::example::Similarity;
use pyramid_core::models::Tier;
use tracing::debug;

use super::phase2_canonicalization::CanonicalizedCluster;

/// A canonicalized cluster with its assigned tier.
#[derive(Debug, Clone)]
pub struct TieredCluster {
    pub canon: CanonicalizedCluster,
    pub tier: Tier,
}

/// The tier rule table. Depends on nothing but its arguments — no hidden
/// state, no randomness — so the same statistics always produce the same
/// tier.
pub fn assign_tier(
    avg_similarity: Similarity,
    member_count: usize,
    has_conflicts: bool,
    config: &PipelineConfig,
) -> Tier {
    if has_conflicts {
        return Tier::Edge;
    }
    let avg = avg_similarity.value();
    if avg >= config.canonical_threshold && member_count >= 2 {
        return Tier::Canonical;
    }
    if avg >= config.variant_threshold {
        return Tier::Variant;
    }
    Tier::Edge
}

/// Assign a tier to every cluster. Members inherit the cluster tier; the
/// canonical member of a canonical-tier cluster becomes the representative
/// entry during assembly.
pub fn tier_clusters(
    clusters: Vec<CanonicalizedCluster>,
    config: &PipelineConfig,
) -> Vec<TieredCluster> {
    clusters
        .into_iter()
        .map(|canon| {
            let tier = assign_tier(
                canon.cluster.avg_similarity,
                canon.cluster.len(),
                canon.cluster.has_conflicts(),
                config,
            );
            debug!(
                cluster = %canon.cluster.id,
                tier = %tier,
                avg = %canon.cluster.avg_similarity,
                members = canon.cluster.len(),
                "tier assigned"
            );
            TieredCluster { canon, tier }
        })
        .collect()
}
