//! Interfaces the availability resolver needs from its collaborators: a
//! source of per-revision snapshots and an optional result cache.

mod types;

use std::sync::Arc;

use avail_api::{AvailabilityInfo, Branch};
use camino::Utf8Path;

pub use types::{CacheKey, ProviderError, ProviderResult, Stat};

/// Read-only view of the source tree at one revision.
pub trait Snapshot: Send + Sync {
    /// Contents of the file at `path`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Implementors surface backend failures for files that exist but cannot
    /// be read.
    fn read(&self, path: &Utf8Path) -> ProviderResult<Option<Vec<u8>>>;

    /// Change fingerprint for `path`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Implementors surface backend failures.
    fn stat(&self, path: &Utf8Path) -> ProviderResult<Option<Stat>>;

    /// Whether `path` exists in this snapshot.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`Snapshot::stat`].
    fn exists(&self, path: &Utf8Path) -> ProviderResult<bool> {
        Ok(self.stat(path)?.is_some())
    }
}

/// Hands out snapshots addressed by branch.
pub trait SnapshotProvider: Send + Sync {
    /// Build the snapshot for `branch`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::BranchUnavailable`] when the branch has no
    /// data, or a backend error.
    fn snapshot(&self, branch: Branch) -> ProviderResult<Arc<dyn Snapshot>>;
}

/// Memoizes computed results. Every method may miss; callers recompute.
pub trait ResultCache: Send + Sync {
    /// Previously stored namespace availability.
    fn availability(&self, key: &CacheKey) -> Option<AvailabilityInfo>;

    /// Store namespace availability.
    fn store_availability(&self, key: CacheKey, info: AvailabilityInfo);

    /// Previously stored serialized node graph.
    fn node_graph(&self, key: &CacheKey) -> Option<Vec<u8>>;

    /// Store a serialized node graph.
    fn store_node_graph(&self, key: CacheKey, graph: Vec<u8>);
}
