/// Pyramid engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Logical schema version stamped on the tag index (Layer 2).
pub const TAG_INDEX_VERSION: &str = "2.0";

/// Operation tag used when the extractor could not classify an example.
pub const UNKNOWN_OPERATION: &str = "unknown";

/// Maximum short-tag length produced by the tag compressor.
pub const MAX_SHORT_TAG_LEN: usize = 4;
