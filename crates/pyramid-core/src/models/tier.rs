use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence tier of a Layer-3 entry.
///
/// Serialized as the short tier codes (`a1`/`a2`/`a3`) used by the on-disk
/// pyramid layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// Well-substantiated: high within-cluster similarity, multiple sources.
    #[serde(rename = "a1")]
    Canonical,
    /// Substantiated with meaningful variation between sources.
    #[serde(rename = "a2")]
    Variant,
    /// Weakly substantiated: outliers, conflicts, deferred or failed merges.
    #[serde(rename = "a3")]
    Edge,
}

impl Tier {
    /// Short tier code as it appears in Layer-2 metadata.
    pub fn code(self) -> &'static str {
        match self {
            Tier::Canonical => "a1",
            Tier::Variant => "a2",
            Tier::Edge => "a3",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Canonical => write!(f, "canonical"),
            Tier::Variant => write!(f, "variant"),
            Tier::Edge => write!(f, "edge"),
        }
    }
}
