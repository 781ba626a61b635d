//! Tag compression for the Layer-2 index: short 2-4 letter codes with a
//! reversing dictionary, assigned most-frequent-first.

use std::collections::BTreeMap;
use std::collections::HashMap;

use pyramid_core::constants::MAX_SHORT_TAG_LEN;

/// Compresses full tags to short codes. Codes are unique per compressor and
/// always reversible through [`TagCompressor::dictionary`].
#[derive(Debug, Default)]
pub struct TagCompressor {
    /// full tag -> short code
    forward: BTreeMap<String, String>,
    /// short code -> full tag
    reverse: BTreeMap<String, String>,
}

impl TagCompressor {
    /// Build compression rules from every tag in the corpus.
    ///
    /// More frequent tags get codes first, so the most-used tags keep the
    /// shortest forms. Ties break alphabetically for determinism.
    pub fn analyze<'a>(tags: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for tag in tags {
            *counts.entry(tag.to_lowercase()).or_default() += 1;
        }

        let mut ordered: Vec<(String, usize)> = counts.into_iter().collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut compressor = Self::default();
        for (tag, _) in ordered {
            let code = compressor.assign_code(&tag);
            compressor.reverse.insert(code.clone(), tag.clone());
            compressor.forward.insert(tag, code);
        }
        compressor
    }

    /// Short code for a tag. Tags unseen at analysis time fall back to their
    /// 3-letter prefix (uncompressed, not registered).
    pub fn compress(&self, tag: &str) -> String {
        let tag = tag.to_lowercase();
        self.forward
            .get(&tag)
            .cloned()
            .unwrap_or_else(|| tag.chars().take(3).collect())
    }

    /// The full tag a short code stands for.
    pub fn expand(&self, code: &str) -> Option<&str> {
        self.reverse.get(code).map(String::as_str)
    }

    /// Short code → full term mapping, for the Layer-2 `dictionary` field.
    pub fn dictionary(&self) -> BTreeMap<String, String> {
        self.reverse.clone()
    }

    fn assign_code(&self, tag: &str) -> String {
        // Already short enough: keep as-is when free.
        if tag.len() <= 3 && !self.reverse.contains_key(tag) {
            return tag.to_string();
        }

        // First three consonants, then prefixes up to the maximum code length.
        let consonants: String = tag.chars().filter(|c| !"aeiou".contains(*c)).collect();
        let mut candidates = Vec::new();
        if consonants.len() >= 3 {
            candidates.push(consonants.chars().take(3).collect::<String>());
        }
        for len in 3..=MAX_SHORT_TAG_LEN {
            candidates.push(tag.chars().take(len).collect());
        }

        for candidate in candidates {
            if !self.reverse.contains_key(&candidate) {
                return candidate;
            }
        }

        // Prefix collisions all the way down: suffix a counter.
        let stem: String = tag.chars().take(3).collect();
        let mut n = 2usize;
        loop {
            let candidate = format!("{stem}{n}");
            if !self.reverse.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}
