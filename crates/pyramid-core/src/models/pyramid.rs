use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::merge::ProvenanceNote;
use super::tier::Tier;
use crate::example::Similarity;

/// The final three-layer structure: apex summary → tag index → tiered
/// content. Fully serializable; the persistence collaborator round-trips
/// this graph as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PyramidIndex {
    /// Layer 1: one summary entry per operation, in content order.
    pub apex: Vec<ApexEntry>,
    /// Apex entry indexes ordered by mention count, descending.
    pub apex_popular: Vec<usize>,
    /// Apex entry indexes ordered alphabetically by operation.
    pub apex_alpha: Vec<usize>,
    /// Layer 2: short tag → content pointers with per-pointer metadata.
    pub tag_index: TagIndex,
    /// Layer 3: the canonical/variant/edge bodies.
    pub content: Vec<ContentEntry>,
}

impl PyramidIndex {
    /// All Layer-3 entries of one tier, in content order.
    pub fn entries_in_tier(&self, tier: Tier) -> impl Iterator<Item = &ContentEntry> {
        self.content.iter().filter(move |e| e.tier == tier)
    }

    /// Look up the apex entry for an operation.
    pub fn apex_for(&self, operation: &str) -> Option<&ApexEntry> {
        self.apex.iter().find(|a| a.operation == operation)
    }
}

/// Layer-1 summary record for one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApexEntry {
    /// Operation tag this entry summarizes.
    pub operation: String,
    /// Total raw example count touching this operation, before any merge.
    pub mention_count: usize,
    /// Distinct Layer-3 entries for this operation, after merge.
    /// Always <= `mention_count`; equality means dedup found nothing here.
    pub example_count: usize,
    /// Number of distinct tiers populated for this operation.
    pub max_depth: usize,
    /// Index of the first Layer-3 entry for this operation, if any.
    pub pointer: Option<usize>,
}

/// Layer 2: compressed-tag lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagIndex {
    /// Logical schema version.
    pub version: String,
    /// Short tag → pointers into Layer 3.
    pub entries: BTreeMap<String, Vec<TagPointer>>,
    /// Short tag → full term, so compressed tags stay reversible.
    pub dictionary: BTreeMap<String, String>,
}

/// One Layer-2 pointer with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagPointer {
    /// Index into `PyramidIndex::content`.
    pub entry: usize,
    /// Tier of the pointed-at entry.
    pub tier: Tier,
    /// Cluster average similarity behind the entry.
    pub similarity: Similarity,
    /// How many of the entry's merged examples carry this tag.
    pub occurrence_count: usize,
    /// Entry kind, mirroring the tier for compact scanning.
    pub kind: EntryKind,
}

/// Compact entry classifier carried on Layer-2 pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Base,
    Var,
    Edge,
}

impl From<Tier> for EntryKind {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Canonical => EntryKind::Base,
            Tier::Variant => EntryKind::Var,
            Tier::Edge => EntryKind::Edge,
        }
    }
}

/// Layer-3 content entry: one deduplicated example body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEntry {
    /// Entry identifier (derived from the canonical example id).
    pub id: String,
    /// Assigned tier.
    pub tier: Tier,
    /// Operation this entry demonstrates.
    pub operation: String,
    /// The canonical body standing for all merged members.
    pub canonical_text: String,
    /// Language of the body.
    pub language: String,
    /// Union of member tags, lowercased and deduplicated.
    pub tags: Vec<String>,
    /// Every input example id merged into this entry. The multiset of these
    /// across all entries must equal the input id set exactly.
    pub member_ids: Vec<String>,
    /// Number of raw examples merged into this entry.
    pub occurrence_count: usize,
    /// Cluster average similarity behind this entry.
    pub similarity: Similarity,
    /// Whether this entry is the representative of a canonical-tier cluster,
    /// used for apex construction.
    pub representative: bool,
    /// Merge decision provenance.
    pub provenance: ProvenanceNote,
    /// Retained conflict descriptions and collaborator notes, if any.
    pub notes: Option<String>,
}
