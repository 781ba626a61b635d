//! Phase 4: Assembly — Layer 3 content first, then the Layer-2 tag index,
//! then the Layer-1 apex, followed by the mandatory completeness validation.
//! A failed validation aborts the build; a partial pyramid is never emitted.

use std::collections::{BTreeMap, HashMap, HashSet};

use pyramid_core::constants::TAG_INDEX_VERSION;
use pyramid_core::errors::{CompletenessError, PyramidResult};
use pyramid_core::example::Example;
use pyramid_core::models::{
    ApexEntry, ContentEntry, EntryKind, ProvenanceNote, PyramidIndex, ReviewItem, ReviewKind,
    TagIndex, TagPointer, Tier,
};
use tracing::{debug, info};

use super::phase3_tiering::TieredCluster;
use crate::algorithms::TagCompressor;

/// Assemble the three layers and validate completeness.
pub fn assemble(
    tiered: &[TieredCluster],
    examples: &[Example],
) -> PyramidResult<(PyramidIndex, Vec<ReviewItem>)> {
    let content = build_content(tiered, examples);
    debug!(entries = content.len(), "layer 3 assembled");

    let compressor = TagCompressor::analyze(
        examples
            .iter()
            .flat_map(|e| e.tags.iter().map(String::as_str)),
    );
    let tag_index = build_tag_index(&content, examples, &compressor);
    debug!(tags = tag_index.entries.len(), "layer 2 assembled");

    let (apex, apex_popular, apex_alpha) = build_apex(&content, examples);
    debug!(operations = apex.len(), "layer 1 assembled");

    validate(&content, &tag_index, &apex, examples)?;

    let review = zero_dedup_signals(&apex, examples);

    info!(
        entries = content.len(),
        operations = apex.len(),
        tags = tag_index.entries.len(),
        "pyramid assembled and validated"
    );

    Ok((
        PyramidIndex {
            apex,
            apex_popular,
            apex_alpha,
            tag_index,
            content,
        },
        review,
    ))
}

/// Layer 3. Merged clusters yield one entry; unmerged clusters yield one
/// entry per exact-duplicate unit, so distinct bodies are never conflated.
fn build_content(tiered: &[TieredCluster], examples: &[Example]) -> Vec<ContentEntry> {
    struct Draft<'a> {
        tier: Tier,
        rep: &'a Example,
        member_idx: Vec<usize>,
        text: String,
        provenance: ProvenanceNote,
        notes: Option<String>,
        representative: bool,
        similarity: pyramid_core::example::Similarity,
    }

    let mut drafts: Vec<Draft<'_>> = Vec::new();
    for tc in tiered {
        let canon = &tc.canon;
        let cluster = &canon.cluster;
        let conflict_notes = conflict_note(cluster);

        if let Some(text) = &canon.canonical_text {
            let rep_idx = canon
                .member_idx
                .iter()
                .copied()
                .find(|&i| examples[i].id == cluster.canonical_id)
                .unwrap_or(canon.member_idx[0]);
            drafts.push(Draft {
                tier: tc.tier,
                rep: &examples[rep_idx],
                member_idx: canon.member_idx.clone(),
                text: text.clone(),
                provenance: canon.provenance.clone(),
                notes: join_notes(&canon.notes, &conflict_notes),
                representative: tc.tier == Tier::Canonical,
                similarity: cluster.avg_similarity,
            });
        } else {
            for unit in &canon.units {
                let rep = &examples[unit[0]];
                let mut provenance = canon.provenance.clone();
                provenance.contributors = unit.iter().map(|&i| examples[i].id.clone()).collect();
                drafts.push(Draft {
                    tier: tc.tier,
                    rep,
                    member_idx: unit.clone(),
                    text: rep.raw_text.clone(),
                    provenance,
                    notes: join_notes(&canon.notes, &conflict_notes),
                    representative: false,
                    similarity: cluster.avg_similarity,
                });
            }
        }
    }

    // Partition by tier, group by operation, then source order.
    drafts.sort_by(|a, b| {
        a.tier
            .cmp(&b.tier)
            .then_with(|| a.rep.operation_tag.cmp(&b.rep.operation_tag))
            .then_with(|| a.rep.source_ref.cmp(&b.rep.source_ref))
    });

    drafts
        .into_iter()
        .map(|d| {
            let member_ids: Vec<String> =
                d.member_idx.iter().map(|&i| examples[i].id.clone()).collect();
            let mut tags: Vec<String> = d
                .member_idx
                .iter()
                .flat_map(|&i| examples[i].tags.iter().map(|t| t.to_lowercase()))
                .collect();
            tags.sort_unstable();
            tags.dedup();
            ContentEntry {
                id: format!("merged_{}", d.rep.id),
                tier: d.tier,
                operation: d.rep.operation_tag.clone(),
                canonical_text: d.text,
                language: d.rep.language.clone(),
                tags,
                occurrence_count: member_ids.len(),
                member_ids,
                similarity: d.similarity,
                representative: d.representative,
                provenance: d.provenance,
                notes: d.notes,
            }
        })
        .collect()
}

/// Layer 2. Pointer occurrence counts are per-tag: the number of the entry's
/// merged examples actually carrying that tag, so per-tag sums reconcile with
/// the raw input during validation.
fn build_tag_index(
    content: &[ContentEntry],
    examples: &[Example],
    compressor: &TagCompressor,
) -> TagIndex {
    let tags_of: HashMap<&str, HashSet<String>> = examples
        .iter()
        .map(|e| {
            (
                e.id.as_str(),
                e.tags.iter().map(|t| t.to_lowercase()).collect(),
            )
        })
        .collect();

    let mut entries: BTreeMap<String, Vec<TagPointer>> = BTreeMap::new();
    for (idx, entry) in content.iter().enumerate() {
        for tag in &entry.tags {
            let tagged_members = entry
                .member_ids
                .iter()
                .filter(|id| {
                    tags_of
                        .get(id.as_str())
                        .is_some_and(|tags| tags.contains(tag))
                })
                .count();
            entries.entry(compressor.compress(tag)).or_default().push(TagPointer {
                entry: idx,
                tier: entry.tier,
                similarity: entry.similarity,
                occurrence_count: tagged_members,
                kind: EntryKind::from(entry.tier),
            });
        }
    }

    TagIndex {
        version: TAG_INDEX_VERSION.to_string(),
        entries,
        dictionary: compressor.dictionary(),
    }
}

/// Layer 1. Apex entries appear in content order; operations that lost all
/// their entries to another operation's merge still get a (pointer-less)
/// entry so their mentions stay accounted for.
fn build_apex(
    content: &[ContentEntry],
    examples: &[Example],
) -> (Vec<ApexEntry>, Vec<usize>, Vec<usize>) {
    let mut mention_counts: HashMap<&str, usize> = HashMap::new();
    for e in examples {
        *mention_counts.entry(e.operation_tag.as_str()).or_default() += 1;
    }

    // First-seen operation order over the content layer.
    let mut op_order: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for entry in content {
        if seen.insert(entry.operation.as_str()) {
            op_order.push(entry.operation.as_str());
        }
    }
    // Operations with mentions but no entry of their own, alphabetically.
    let mut leftover: Vec<&str> = mention_counts
        .keys()
        .copied()
        .filter(|op| !seen.contains(op))
        .collect();
    leftover.sort_unstable();
    op_order.extend(leftover);

    let apex: Vec<ApexEntry> = op_order
        .iter()
        .map(|&op| {
            let indexes: Vec<usize> = content
                .iter()
                .enumerate()
                .filter(|(_, e)| e.operation == op)
                .map(|(i, _)| i)
                .collect();
            let tiers: HashSet<Tier> = indexes.iter().map(|&i| content[i].tier).collect();
            ApexEntry {
                operation: op.to_string(),
                mention_count: mention_counts.get(op).copied().unwrap_or(0),
                example_count: indexes.len(),
                max_depth: tiers.len(),
                pointer: indexes.first().copied(),
            }
        })
        .collect();

    let mut popular: Vec<usize> = (0..apex.len()).collect();
    popular.sort_by(|&a, &b| {
        apex[b]
            .mention_count
            .cmp(&apex[a].mention_count)
            .then_with(|| apex[a].operation.cmp(&apex[b].operation))
    });
    let mut alpha: Vec<usize> = (0..apex.len()).collect();
    alpha.sort_by(|&a, &b| apex[a].operation.cmp(&apex[b].operation));

    (apex, popular, alpha)
}

/// The mandatory validation pass: id completeness across Layer 3, per-tag
/// occurrence reconciliation for Layer 2, count reconciliation for Layer 1.
fn validate(
    content: &[ContentEntry],
    tag_index: &TagIndex,
    apex: &[ApexEntry],
    examples: &[Example],
) -> Result<(), CompletenessError> {
    // (a) Every input id in exactly one Layer-3 entry.
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for entry in content {
        for id in &entry.member_ids {
            *seen.entry(id.as_str()).or_default() += 1;
        }
    }
    let input_ids: HashSet<&str> = examples.iter().map(|e| e.id.as_str()).collect();
    let missing: Vec<String> = input_ids
        .iter()
        .filter(|id| !seen.contains_key(**id))
        .map(|id| id.to_string())
        .collect();
    let duplicated: Vec<String> = seen
        .iter()
        .filter(|(id, &count)| count > 1 || !input_ids.contains(**id))
        .map(|(id, _)| id.to_string())
        .collect();
    if !missing.is_empty() || !duplicated.is_empty() {
        let mut missing = missing;
        let mut duplicated = duplicated;
        missing.sort_unstable();
        duplicated.sort_unstable();
        return Err(CompletenessError {
            missing,
            duplicated,
            detail: "layer 3 id completeness".to_string(),
        });
    }

    // (b) Per-tag occurrence sums equal the raw tagged-example counts.
    let mut expected: HashMap<String, usize> = HashMap::new();
    for e in examples {
        let mut tags: Vec<String> = e.tags.iter().map(|t| t.to_lowercase()).collect();
        tags.sort_unstable();
        tags.dedup();
        for tag in tags {
            *expected.entry(tag).or_default() += 1;
        }
    }
    for (short, pointers) in &tag_index.entries {
        let full = tag_index
            .dictionary
            .get(short)
            .cloned()
            .unwrap_or_else(|| short.clone());
        let counted: usize = pointers.iter().map(|p| p.occurrence_count).sum();
        let raw = expected.get(&full).copied().unwrap_or(0);
        if counted != raw {
            return Err(CompletenessError {
                missing: vec![],
                duplicated: vec![],
                detail: format!(
                    "layer 2 occurrence reconciliation for tag '{full}': {counted} counted, {raw} raw"
                ),
            });
        }
    }

    // (c) Layer-1 counts reconcile with Layer 3. Mentions count raw examples
    // under their own operation tag; entries count under the representative's
    // tag. A cluster that merges examples from several operations therefore
    // leaves the absorbed operations with mentions but no entries of their
    // own, which is why `example_count` can be zero while `mention_count` is
    // not.
    for entry in apex {
        let actual = content
            .iter()
            .filter(|e| e.operation == entry.operation)
            .count();
        if entry.example_count != actual || entry.mention_count < entry.example_count {
            return Err(CompletenessError {
                missing: vec![],
                duplicated: vec![],
                detail: format!(
                    "layer 1 reconciliation for operation '{}': {} mentions, {} entries, {} recorded",
                    entry.operation, entry.mention_count, actual, entry.example_count
                ),
            });
        }
    }

    Ok(())
}

/// Operations where dedup found nothing — reported, not failed.
fn zero_dedup_signals(apex: &[ApexEntry], examples: &[Example]) -> Vec<ReviewItem> {
    apex.iter()
        .filter(|a| a.mention_count > 0 && a.mention_count == a.example_count)
        .map(|a| ReviewItem {
            kind: ReviewKind::ZeroDedup,
            cluster_id: None,
            detail: format!("dedup found nothing for operation '{}'", a.operation),
            example_ids: examples
                .iter()
                .filter(|e| e.operation_tag == a.operation)
                .map(|e| e.id.clone())
                .collect(),
        })
        .collect()
}

fn conflict_note(cluster: &pyramid_core::models::Cluster) -> Option<String> {
    if cluster.conflicts.is_empty() {
        return None;
    }
    let descriptions: Vec<&str> = cluster
        .conflicts
        .iter()
        .map(|c| c.description.as_str())
        .collect();
    Some(format!("conflicts: {}", descriptions.join("; ")))
}

fn join_notes(merge_notes: &Option<String>, conflict_notes: &Option<String>) -> Option<String> {
    match (merge_notes, conflict_notes) {
        (None, None) => None,
        (Some(m), None) => Some(m.clone()),
        (None, Some(c)) => Some(c.clone()),
        (Some(m), Some(c)) => Some(format!("{m}\n{c}")),
    }
}
