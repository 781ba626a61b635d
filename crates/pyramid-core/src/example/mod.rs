//! The Example record and its value types.

mod record;
mod similarity;
mod source_ref;

pub use record::Example;
pub use similarity::Similarity;
pub use source_ref::SourceRef;
