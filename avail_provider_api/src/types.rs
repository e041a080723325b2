use std::fmt;

use serde::{Deserialize, Serialize};

use avail_api::{Branch, Platform};

/// Cheap per-path change fingerprint. Two snapshots reporting equal stats for
/// a path hold identical content at that path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stat(String);

impl Stat {
    /// Wrap a backend-specific fingerprint (object id, version counter, ...).
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The fingerprint text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors reported by snapshot providers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// No snapshot can be built for the branch.
    #[error("no snapshot available for branch {branch}")]
    BranchUnavailable {
        /// Branch that could not be resolved.
        branch: Branch,
    },
    /// A file existed but could not be read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// Path inside the snapshot.
        path: String,
        /// Backend-provided detail.
        message: String,
    },
    /// Any other backend failure.
    #[error("snapshot backend error: {0}")]
    Backend(String),
}

/// Result type used by provider implementations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Key under which computed results are memoized.
///
/// `fingerprint` identifies the revision set the result was computed against,
/// so a catalog update naturally misses stale entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Normalized API namespace.
    pub namespace: String,
    /// Platform the result was computed for.
    pub platform: Platform,
    /// Fingerprint of the whole channel catalog, history and heads.
    pub fingerprint: String,
}

impl CacheKey {
    /// Construct a cache key.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        platform: Platform,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            platform,
            fingerprint: fingerprint.into(),
        }
    }
}
