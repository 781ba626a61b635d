use serde::{Deserialize, Serialize};
use std::fmt;

/// Cosine similarity clamped to [-1.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Similarity(f64);

impl Similarity {
    /// Similarity of an example to itself, and of exact duplicates.
    pub const IDENTICAL: Similarity = Similarity(1.0);

    /// Create a new Similarity, clamping to [-1.0, 1.0].
    pub fn new(value: f64) -> Self {
        Self(value.clamp(-1.0, 1.0))
    }

    /// Get the raw f64 value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Mean of a set of pairwise similarities. Empty input yields 0.0 —
    /// a single-member cluster carries no pairwise evidence and must not
    /// pass the variant threshold on a default.
    pub fn mean(values: &[Similarity]) -> Similarity {
        if values.is_empty() {
            return Similarity(0.0);
        }
        let sum: f64 = values.iter().map(|s| s.0).sum();
        Similarity::new(sum / values.len() as f64)
    }
}

impl Default for Similarity {
    fn default() -> Self {
        Self(0.0)
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl From<f64> for Similarity {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Similarity> for f64 {
    fn from(s: Similarity) -> Self {
        s.0
    }
}
