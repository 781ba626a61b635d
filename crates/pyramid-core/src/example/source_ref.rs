use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance of an example: source file plus line range.
///
/// Ordering is file path first, then line range. This ordering is the
/// deterministic tie-break used by canonical selection and cluster seeding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source file the example was extracted from.
    pub file: String,
    /// First line of the example in the source file (1-based).
    pub line_start: u32,
    /// Last line of the example in the source file (inclusive).
    pub line_end: u32,
}

impl SourceRef {
    pub fn new(file: impl Into<String>, line_start: u32, line_end: u32) -> Self {
        Self {
            file: file.into(),
            line_start,
            line_end,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.file, self.line_start, self.line_end)
    }
}
