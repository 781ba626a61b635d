//! Similarity primitives and tag compression.

pub mod similarity;
pub mod tags;

pub use similarity::{cosine_similarity, SimilarityIndex};
pub use tags::TagCompressor;
