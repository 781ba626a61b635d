use crate::errors::PyramidResult;
use crate::example::Example;
use crate::models::{Cluster, MergeOutcome};

/// External AI-merge collaborator.
///
/// The engine never merges example bodies itself; any cluster whose members
/// genuinely differ is handed to this interface. Contract: must return within
/// a bounded time or fail — a failure degrades the cluster to edge tier, it
/// never aborts the build.
pub trait IMergeProvider: Send + Sync {
    /// Merge a cluster's members into one canonical body.
    ///
    /// `members` is the resolved member list for `cluster`, in member order.
    fn merge(&self, cluster: &Cluster, members: &[&Example]) -> PyramidResult<MergeOutcome>;

    /// Human-readable provider name.
    fn name(&self) -> &str;
}
