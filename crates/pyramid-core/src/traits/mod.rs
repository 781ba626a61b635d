//! Injected collaborator interfaces. Implementations live outside this
//! workspace; tests substitute deterministic fakes.

mod embedding;
mod merger;

pub use embedding::IEmbeddingProvider;
pub use merger::IMergeProvider;
