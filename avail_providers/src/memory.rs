use std::collections::BTreeMap;
use std::sync::Arc;

use avail_api::Branch;
use avail_provider_api::{ProviderError, ProviderResult, Snapshot, SnapshotProvider, Stat};
use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
struct MemoryFile {
    contents: Vec<u8>,
    stat: Stat,
}

/// Snapshot whose files live in memory.
///
/// Stats default to a content digest, so identical contents on two branches
/// compare equal the way blob ids do in a real repository.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    files: BTreeMap<Utf8PathBuf, MemoryFile>,
}

impl MemorySnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file whose stat is derived from its contents.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<Utf8PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Add a file with an explicit stat.
    #[must_use]
    pub fn with_file_stat(
        mut self,
        path: impl Into<Utf8PathBuf>,
        contents: impl Into<Vec<u8>>,
        stat: Stat,
    ) -> Self {
        self.files.insert(
            path.into(),
            MemoryFile {
                contents: contents.into(),
                stat,
            },
        );
        self
    }

    /// Insert or replace a file whose stat is derived from its contents.
    pub fn insert(&mut self, path: impl Into<Utf8PathBuf>, contents: impl Into<Vec<u8>>) {
        let contents = contents.into();
        let stat = Stat::new(hex::encode(Sha256::digest(&contents)));
        self.files.insert(path.into(), MemoryFile { contents, stat });
    }
}

impl Snapshot for MemorySnapshot {
    fn read(&self, path: &Utf8Path) -> ProviderResult<Option<Vec<u8>>> {
        Ok(self.files.get(path).map(|file| file.contents.clone()))
    }

    fn stat(&self, path: &Utf8Path) -> ProviderResult<Option<Stat>> {
        Ok(self.files.get(path).map(|file| file.stat.clone()))
    }
}

/// Provider serving a fixed set of in-memory branches.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotProvider {
    branches: BTreeMap<Branch, Arc<MemorySnapshot>>,
}

impl MemorySnapshotProvider {
    /// Create a provider with no branches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the snapshot served for `branch`.
    #[must_use]
    pub fn with_branch(mut self, branch: Branch, snapshot: MemorySnapshot) -> Self {
        self.insert(branch, snapshot);
        self
    }

    /// Register or replace the snapshot served for `branch`.
    pub fn insert(&mut self, branch: Branch, snapshot: MemorySnapshot) {
        self.branches.insert(branch, Arc::new(snapshot));
    }

    /// Number of registered branches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Whether no branches are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

impl SnapshotProvider for MemorySnapshotProvider {
    fn snapshot(&self, branch: Branch) -> ProviderResult<Arc<dyn Snapshot>> {
        self.branches
            .get(&branch)
            .map(|snapshot| Arc::clone(snapshot) as Arc<dyn Snapshot>)
            .ok_or(ProviderError::BranchUnavailable { branch })
    }
}
