//! Mapping from tenants to their key prefix in the shared bucket.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::validator::ResourcePath;

/// Identifier of the authenticated owner of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic `tenant -> prefix` mapping: `user_prefix + tenant + user_suffix`.
///
/// Every object belonging to a tenant lives under its prefix. Nothing below the resource
/// service is tenant-aware; it only ever sees full keys built here.
#[derive(Debug, Clone)]
pub struct UserNamespace {
    user_prefix: String,
    user_suffix: String,
}

impl UserNamespace {
    pub fn new(user_prefix: impl Into<String>, user_suffix: impl Into<String>) -> Self {
        Self {
            user_prefix: user_prefix.into(),
            user_suffix: user_suffix.into(),
        }
    }

    /// Key prefix owning every object of `tenant`.
    pub fn prefix(&self, tenant: TenantId) -> String {
        format!("{}{}{}", self.user_prefix, tenant, self.user_suffix)
    }

    /// Object key for a logical path. The root maps to the prefix itself.
    pub fn key(&self, tenant: TenantId, path: &ResourcePath) -> String {
        format!("{}{}", self.prefix(tenant), path.relative())
    }

    /// Strip the tenant prefix from a key, yielding the logical path suffix.
    pub fn strip<'a>(&self, tenant: TenantId, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&self.prefix(tenant))
    }
}
