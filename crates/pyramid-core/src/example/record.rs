use serde::{Deserialize, Serialize};

use super::source_ref::SourceRef;
use crate::constants::UNKNOWN_OPERATION;

/// One extracted documentation/code unit subject to deduplication.
///
/// Produced by an external extractor; the engine never creates examples,
/// it only clusters, merges, and tiers them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    /// Stable identifier, derived by the extractor from source file + location.
    pub id: String,
    /// Original text/code, verbatim.
    pub raw_text: String,
    /// Whitespace-collapsed, lowercased form used for exact-duplicate hashing.
    pub normalized_text: String,
    /// blake3 hash of `normalized_text` — the deterministic dedup signal.
    pub content_hash: String,
    /// Embedding vector. Immutable once assigned.
    pub embedding: Option<Vec<f32>>,
    /// Provenance. Never discarded.
    pub source_ref: SourceRef,
    /// Best-effort classification of which operation the example demonstrates.
    pub operation_tag: String,
    /// Language of the example body.
    pub language: String,
    /// Auto-detected tags from the extractor, feeding the Layer-2 tag index.
    pub tags: Vec<String>,
}

impl Example {
    /// Build an example from extractor output. Normalization and the content
    /// hash are computed here so every example entering the pipeline carries
    /// them.
    pub fn new(id: impl Into<String>, raw_text: impl Into<String>, source_ref: SourceRef) -> Self {
        let raw_text = raw_text.into();
        let normalized_text = Self::normalize(&raw_text);
        let content_hash = Self::compute_content_hash(&normalized_text);
        Self {
            id: id.into(),
            raw_text,
            normalized_text,
            content_hash,
            embedding: None,
            source_ref,
            operation_tag: UNKNOWN_OPERATION.to_string(),
            language: "python".to_string(),
            tags: Vec::new(),
        }
    }

    /// Set the operation tag (builder style).
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation_tag = operation.into();
        self
    }

    /// Set tags (builder style).
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Attach an embedding (builder style).
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Whitespace/case normalization: collapse runs of whitespace to a single
    /// space, trim, lowercase. Two examples that differ only in formatting
    /// normalize to the same string.
    pub fn normalize(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Compute the blake3 content hash of a normalized text.
    pub fn compute_content_hash(normalized_text: &str) -> String {
        blake3::hash(normalized_text.as_bytes()).to_hex().to_string()
    }

    /// Exact-duplicate check: content hashes match. This is the only
    /// deterministic dedup signal and is always checked before any
    /// embedding-based comparison.
    pub fn exact_duplicate(&self, other: &Self) -> bool {
        self.content_hash == other.content_hash
    }
}

/// Identity equality: two examples are equal if they have the same ID.
/// For content comparison use [`Example::exact_duplicate`].
impl PartialEq for Example {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
