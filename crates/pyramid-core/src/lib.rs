//! # pyramid-core
//!
//! Foundation crate for the Pyramid deduplication engine.
//! Defines all types, traits, errors, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod example;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::PipelineConfig;
pub use errors::{PyramidError, PyramidResult};
pub use example::{Example, Similarity, SourceRef};
pub use models::{Cluster, Conflict, MergeOutcome, PyramidIndex, Tier};
