use serde::{Deserialize, Serialize};

use crate::example::Similarity;

/// A group of examples judged similar enough to consider merging.
///
/// Created by the clusterer, mutated by the canonicalizer (canonical
/// selection, conflict flags), read-only for tiering and assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Deterministic identifier: blake3 of the sorted member id list.
    /// Stable across runs over the same input, so deferred decisions from a
    /// previous run can be resolved against it.
    pub id: String,
    /// Member example ids, ordered by source reference. Never empty.
    pub members: Vec<String>,
    /// The chosen representative. Always one of `members`.
    pub canonical_id: String,
    /// Mean pairwise similarity among members. 0.0 for single-member clusters.
    pub avg_similarity: Similarity,
    /// Flagged contradictions requiring external review. Non-empty conflicts
    /// force the edge tier and the delegated merge path.
    pub conflicts: Vec<Conflict>,
    /// True when this cluster was produced as a singleton outlier (no
    /// neighbor above the edge threshold).
    pub outlier: bool,
}

impl Cluster {
    /// Deterministic cluster id from the member id set.
    pub fn derive_id(member_ids: &[String]) -> String {
        let mut sorted: Vec<&str> = member_ids.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        let joined = sorted.join("\n");
        blake3::hash(joined.as_bytes()).to_hex().as_str()[..16].to_string()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// A flagged contradiction between cluster members, e.g. two examples
/// presenting mutually exclusive parameter defaults as "the" correct value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    /// Human-readable description of the disagreement.
    pub description: String,
    /// IDs of the examples that disagree.
    pub example_ids: Vec<String>,
    /// How the conflict was detected or why it remains open.
    pub kind: ConflictKind,
}

/// Origin of a conflict flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Members disagree on an observable outcome; flagged by the caller or
    /// an upstream analysis pass.
    ContradictoryOutcome,
    /// Some member content cannot be carried through a merge without loss.
    /// Supplied by the caller (via the known-conflicts build option) or a
    /// previous run's review, like [`ConflictKind::ContradictoryOutcome`];
    /// the engine itself never judges content. Information is never silently
    /// dropped; it is surfaced here instead.
    NonPreservable,
    /// The external merge call failed or timed out.
    MergeFailed,
    /// The external merge budget was exhausted before this cluster's turn.
    BudgetExhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_id_is_order_independent() {
        let a = Cluster::derive_id(&["x".to_string(), "y".to_string()]);
        let b = Cluster::derive_id(&["y".to_string(), "x".to_string()]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn cluster_id_differs_for_different_members() {
        let a = Cluster::derive_id(&["x".to_string()]);
        let b = Cluster::derive_id(&["z".to_string()]);
        assert_ne!(a, b);
    }
}
