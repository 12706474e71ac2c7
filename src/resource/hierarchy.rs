//! Rebuild the implied directory tree from a flat key listing.

use indexmap::IndexSet;

use crate::path::ResourcePath;

/// Collects every file path and every ancestor directory implied by a set of keys.
///
/// Keys are fed in listing order; the candidate set keeps first-seen order and holds each
/// path once.
#[derive(Debug)]
pub struct HierarchyReconstructor {
    prefix: String,
    candidates: IndexSet<String>,
}

impl HierarchyReconstructor {
    /// `prefix` is the tenant prefix stripped from every key.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            candidates: IndexSet::new(),
        }
    }

    /// Record one key. Keys outside the prefix and the tenant marker itself are ignored.
    pub fn add(&mut self, key: &str) {
        let Some(relative) = key.strip_prefix(self.prefix.as_str()) else {
            return;
        };
        if relative.is_empty() {
            return;
        }

        let mut dir = if relative.ends_with('/') {
            relative
        } else {
            self.candidates.insert(relative.to_string());
            match relative.rfind('/') {
                Some(idx) => &relative[..=idx],
                None => "",
            }
        };

        while !dir.is_empty() {
            if !self.candidates.insert(dir.to_string()) {
                // Every ancestor of a directory already seen is in the set too.
                break;
            }
            let trimmed = &dir[..dir.len() - 1];
            dir = match trimmed.rfind('/') {
                Some(idx) => &trimmed[..=idx],
                None => "",
            };
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Every reconstructed path: directories end with `/`, files do not.
    pub fn into_candidates(self) -> Vec<ResourcePath> {
        self.candidates
            .iter()
            .map(|relative| ResourcePath::from_relative(relative))
            .collect()
    }
}
