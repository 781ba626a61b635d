use serde::{Deserialize, Serialize};

/// Result returned by the external AI-merge collaborator.
///
/// The engine treats the collaborator as an opaque function; semantic merging
/// of example bodies is a hard boundary it never crosses itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// The merged canonical body standing for the whole cluster.
    pub canonical_text: String,
    /// Collaborator notes: variations covered, caveats, dropped context.
    pub notes: String,
    /// Whether flagged conflicts were resolved by the merge. If false, the
    /// cluster keeps its conflicts and stays on the edge tier.
    pub conflicts_resolved: bool,
}

/// Which path a cluster took through canonicalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePath {
    /// High similarity, small cluster: canonical stands alone, the rest are
    /// recorded as pure duplicates. No external call.
    Mechanical,
    /// Delegated to the external AI-merge collaborator.
    Delegated,
    /// Resolved from a previous run's review decision, no new external call.
    Resolved,
    /// No merge attempted; every member kept as an independent entry.
    Standalone,
    /// Removed from the auto-merge path by the caller; held at best-known
    /// tier until a deferred decision resolves.
    Deferred,
    /// External merge was required but unavailable (budget exhausted,
    /// provider failure, or timeout); force-assigned to edge tier.
    ForcedEdge,
}

/// Provenance record for one merge decision. Every decision — mechanical or
/// delegated — produces one; nothing is merged without a paper trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceNote {
    /// The cluster this decision belongs to.
    pub cluster_id: String,
    /// The path taken.
    pub path: MergePath,
    /// Example ids that contributed to the canonical body.
    pub contributors: Vec<String>,
    /// False when some information was judged non-preservable. In that case
    /// a conflict is flagged on the cluster as well; loss is never silent.
    pub lossless: bool,
    /// Free-form notes (collaborator output, failure reasons).
    pub notes: Option<String>,
}
