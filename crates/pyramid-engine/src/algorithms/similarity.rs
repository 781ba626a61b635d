//! Cosine similarity over example embeddings, memoized per unordered pair.

use std::collections::HashMap;
use std::sync::Mutex;

use pyramid_core::example::{Example, Similarity};
use pyramid_core::errors::{PyramidError, PyramidResult};

/// Cosine similarity between two vectors.
/// Returns 0.0 for zero-length, mismatched, or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut mag_a, mut mag_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < f64::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

/// Pairwise similarity over a fixed example set, computed on demand and
/// memoized so each unordered pair is compared at most once.
///
/// Exact duplicates (matching content hashes) short-circuit to 1.0 without
/// touching the embeddings: the hash is the cheap, unambiguous signal and is
/// always consulted first.
pub struct SimilarityIndex<'a> {
    examples: &'a [Example],
    cache: Mutex<HashMap<(usize, usize), Similarity>>,
}

impl<'a> SimilarityIndex<'a> {
    pub fn new(examples: &'a [Example]) -> Self {
        Self {
            examples,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Exact-duplicate check by content hash.
    pub fn exact_duplicate(&self, a: usize, b: usize) -> bool {
        self.examples[a].exact_duplicate(&self.examples[b])
    }

    /// Similarity between examples `a` and `b` (indexes into the input set).
    ///
    /// Fails with `MissingEmbedding` if either example lacks an embedding —
    /// a missing vector is never silently treated as similarity 0.
    pub fn similarity(&self, a: usize, b: usize) -> PyramidResult<Similarity> {
        if a == b {
            return Ok(Similarity::IDENTICAL);
        }
        if self.exact_duplicate(a, b) {
            return Ok(Similarity::IDENTICAL);
        }

        let key = (a.min(b), a.max(b));
        if let Some(sim) = self.cache.lock().expect("similarity cache poisoned").get(&key) {
            return Ok(*sim);
        }

        let ea = self.embedding_of(a)?;
        let eb = self.embedding_of(b)?;
        let sim = Similarity::new(cosine_similarity(ea, eb));

        self.cache
            .lock()
            .expect("similarity cache poisoned")
            .insert(key, sim);
        Ok(sim)
    }

    /// Mean pairwise similarity among a set of example indexes.
    /// A single index yields 0.0 — no pairwise evidence.
    pub fn mean_pairwise(&self, indexes: &[usize]) -> PyramidResult<Similarity> {
        let mut sims = Vec::new();
        for (pos, &i) in indexes.iter().enumerate() {
            for &j in &indexes[pos + 1..] {
                sims.push(self.similarity(i, j)?);
            }
        }
        Ok(Similarity::mean(&sims))
    }

    /// Mean similarity of one example to each of the given others.
    pub fn mean_to(&self, from: usize, others: &[usize]) -> PyramidResult<Similarity> {
        let mut sims = Vec::new();
        for &j in others {
            if j != from {
                sims.push(self.similarity(from, j)?);
            }
        }
        Ok(Similarity::mean(&sims))
    }

    fn embedding_of(&self, idx: usize) -> PyramidResult<&'a [f32]> {
        self.examples[idx]
            .embedding
            .as_deref()
            .ok_or_else(|| PyramidError::MissingEmbedding {
                example_id: self.examples[idx].id.clone(),
            })
    }
}
