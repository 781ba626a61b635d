//! # pyramid-engine
//!
//! 4-phase deduplication pipeline: clustering (exact hash + threshold graph)
//! → canonicalization (mechanical or delegated merge) → tiering → assembly
//! into the validated three-layer pyramid index.

pub mod algorithms;
pub mod budget;
pub mod engine;
pub mod pipeline;

pub use budget::MergeBudget;
pub use engine::{BuildOutput, PyramidEngine};
pub use pipeline::BuildOptions;
