//! Shared model types: clusters, tiers, merge outcomes, the pyramid index,
//! and review reporting.

mod cluster;
mod merge;
mod pyramid;
mod report;
mod tier;

pub use cluster::{Cluster, Conflict, ConflictKind};
pub use merge::{MergeOutcome, MergePath, ProvenanceNote};
pub use pyramid::{ApexEntry, ContentEntry, EntryKind, PyramidIndex, TagIndex, TagPointer};
pub use report::{BuildStats, ReviewItem, ReviewKind, ReviewReport};
pub use tier::Tier;
