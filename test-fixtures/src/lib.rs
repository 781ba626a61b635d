//! Shared test fixtures: deterministic providers and example builders used
//! by integration and property tests across the workspace.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use pyramid_core::errors::{MergeError, PyramidResult};
use pyramid_core::example::{Example, SourceRef};
use pyramid_core::models::{Cluster, MergeOutcome};
use pyramid_core::traits::{IEmbeddingProvider, IMergeProvider};

/// Build an example with the usual defaults; `line` keeps source order
/// explicit in tests.
pub fn example(id: &str, text: &str, operation: &str, line: u32) -> Example {
    Example::new(id, text, SourceRef::new("fixtures.md", line, line + 3)).with_operation(operation)
}

/// Same, with tags attached.
pub fn tagged_example(
    id: &str,
    text: &str,
    operation: &str,
    tags: &[&str],
    line: u32,
) -> Example {
    example(id, text, operation, line).with_tags(tags.iter().map(|t| t.to_string()).collect())
}

/// Deterministic embedding provider: hashes the normalized text into a unit
/// vector. Identical texts get identical embeddings and unrelated texts are
/// close to orthogonal, which is all the pipeline's geometry needs.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl IEmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> PyramidResult<Vec<f32>> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut hasher = blake3::Hasher::new();
        hasher.update(normalized.to_lowercase().as_bytes());
        let mut reader = hasher.finalize_xof();
        let mut bytes = vec![0u8; self.dimensions * 4];
        reader.fill(&mut bytes);

        let mut vector: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| {
                let raw = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                (raw as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect();
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[String]) -> PyramidResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash-embedder"
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Merge provider that concatenates member texts and resolves conflicts when
/// asked to. Counts its calls so tests can assert budget behavior.
pub struct ScriptedMerger {
    pub resolve_conflicts: bool,
    calls: AtomicUsize,
    merged_clusters: Mutex<Vec<String>>,
}

impl ScriptedMerger {
    pub fn new(resolve_conflicts: bool) -> Self {
        Self {
            resolve_conflicts,
            calls: AtomicUsize::new(0),
            merged_clusters: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn merged_clusters(&self) -> Vec<String> {
        self.merged_clusters
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl Default for ScriptedMerger {
    fn default() -> Self {
        Self::new(true)
    }
}

impl IMergeProvider for ScriptedMerger {
    fn merge(&self, cluster: &Cluster, members: &[&Example]) -> PyramidResult<MergeOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut merged) = self.merged_clusters.lock() {
            merged.push(cluster.id.clone());
        }
        let canonical = members
            .iter()
            .find(|m| m.id == cluster.canonical_id)
            .unwrap_or(&members[0]);
        Ok(MergeOutcome {
            canonical_text: canonical.raw_text.clone(),
            notes: format!("merged {} members", members.len()),
            conflicts_resolved: self.resolve_conflicts,
        })
    }

    fn name(&self) -> &str {
        "scripted-merger"
    }
}

/// Merge provider that always times out. Exercises the degrade-to-edge path.
#[derive(Default)]
pub struct FailingMerger {
    calls: AtomicUsize,
}

impl FailingMerger {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IMergeProvider for FailingMerger {
    fn merge(&self, cluster: &Cluster, _members: &[&Example]) -> PyramidResult<MergeOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(MergeError::Timeout {
            cluster_id: cluster.id.clone(),
        }
        .into())
    }

    fn name(&self) -> &str {
        "failing-merger"
    }
}
