//! Structural validation of paths and search queries.
//!
//! A path that passes [`validate_path`] is wrapped in a [`ResourcePath`], which carries the
//! file/directory classification so that no other layer re-derives it from the trailing
//! separator.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::normalizer::{normalize, ROOT};
use crate::{CloudshelfError, Result};

static PATH_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}0-9._\- /]+$").expect("static regex"));

static QUERY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._\-/]+$").expect("static regex"));

/// Reject structurally unsafe paths.
///
/// Fails with `PathNotValid` when the path contains a doubled separator, characters outside
/// letters, digits, `._- /` and space, or any blank, `.` or `..` segment. A single trailing
/// separator is allowed and marks a directory.
pub fn validate_path(path: &str) -> Result<()> {
    if path.contains("//") {
        return Err(CloudshelfError::PathNotValid(format!(
            "{path}: doubled separator"
        )));
    }

    if !PATH_CHARS.is_match(path) {
        return Err(CloudshelfError::PathNotValid(format!(
            "{path}: forbidden characters"
        )));
    }

    if path == ROOT {
        return Ok(());
    }

    let body = path.strip_suffix('/').unwrap_or(path);
    for segment in body.split('/') {
        if segment.trim().is_empty() || segment == "." || segment == ".." {
            return Err(CloudshelfError::PathNotValid(format!(
                "{path}: invalid segment {segment:?}"
            )));
        }
    }

    Ok(())
}

/// Reject search queries that are empty or contain characters outside `[a-zA-Z0-9._-/]`.
pub fn validate_query(query: &str) -> Result<()> {
    if query.is_empty() {
        return Err(CloudshelfError::QueryNotValid(
            "query should not be empty".to_string(),
        ));
    }

    if !QUERY_CHARS.is_match(query) {
        return Err(CloudshelfError::QueryNotValid(format!("{query}: forbidden characters")));
    }

    Ok(())
}

/// Whether a path denotes a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    File,
    Directory,
}

impl ResourceKind {
    /// Classify a path or key by its trailing separator.
    ///
    /// This is the only place where the suffix convention is interpreted.
    pub fn of(path: &str) -> Self {
        if path.is_empty() || path.ends_with('/') {
            ResourceKind::Directory
        } else {
            ResourceKind::File
        }
    }
}

/// A normalized, structurally valid path relative to the tenant root.
///
/// Directories end with `/`, files do not. The root is stored as the empty relative path
/// and displayed as `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    relative: String,
    kind: ResourceKind,
}

impl ResourcePath {
    /// Normalize and validate a raw, user-supplied path.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize(raw);
        validate_path(&normalized)?;
        Ok(Self::from_relative(if normalized == ROOT {
            ""
        } else {
            &normalized
        }))
    }

    /// The tenant root directory.
    pub fn root() -> Self {
        Self::from_relative("")
    }

    /// Build a path from a key suffix already known to be well formed, e.g. a listing
    /// entry with the tenant prefix stripped.
    pub(crate) fn from_relative(relative: &str) -> Self {
        Self {
            relative: relative.to_string(),
            kind: ResourceKind::of(relative),
        }
    }

    /// Directory or file.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ResourceKind::Directory
    }

    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// The path relative to the tenant root; empty for the root itself.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Final segment, without the trailing separator for directories.
    pub fn name(&self) -> &str {
        let trimmed = self.relative.strip_suffix('/').unwrap_or(&self.relative);
        match trimmed.rfind('/') {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        }
    }

    /// The containing directory, always ending in `/` (`/` for top-level entries).
    pub fn parent_path(&self) -> String {
        let trimmed = self.relative.strip_suffix('/').unwrap_or(&self.relative);
        match trimmed.rfind('/') {
            Some(idx) => trimmed[..=idx].to_string(),
            None => ROOT.to_string(),
        }
    }

    /// The containing directory as a path; `None` for the root.
    pub fn parent(&self) -> Option<ResourcePath> {
        if self.is_root() {
            return None;
        }
        let trimmed = self.relative.strip_suffix('/').unwrap_or(&self.relative);
        Some(match trimmed.rfind('/') {
            Some(idx) => Self::from_relative(&trimmed[..=idx]),
            None => Self::root(),
        })
    }

    /// Append a relative name to this directory and validate the result.
    pub fn join(&self, name: &str) -> Result<ResourcePath> {
        if !self.is_directory() {
            return Err(CloudshelfError::PathNotValid(format!(
                "{self}: not a directory"
            )));
        }
        let name = name.strip_prefix('/').unwrap_or(name);
        let joined = format!("{}{}", self.relative, name);
        validate_path(&joined)?;
        Ok(Self::from_relative(&joined))
    }

    /// Whether `other` lies strictly inside this directory.
    pub fn contains(&self, other: &ResourcePath) -> bool {
        self.is_directory()
            && other.relative.len() > self.relative.len()
            && other.relative.starts_with(&self.relative)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(ROOT)
        } else {
            f.write_str(&self.relative)
        }
    }
}
