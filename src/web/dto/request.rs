//! Request DTOs for the HTTP API.

use serde::Deserialize;

/// `?path=` query; a missing path means the root.
#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

/// Move/rename query.
#[derive(Debug, Deserialize)]
pub struct MoveQuery {
    /// Current path.
    #[serde(default)]
    pub from: String,
    /// New path.
    #[serde(default)]
    pub to: String,
}

/// Search query.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}
