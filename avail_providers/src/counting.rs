use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use avail_api::Branch;
use avail_provider_api::{ProviderResult, Snapshot, SnapshotProvider, Stat};
use camino::{Utf8Path, Utf8PathBuf};

#[derive(Debug, Default)]
struct Counters {
    snapshots: AtomicU64,
    reads: Mutex<HashMap<Utf8PathBuf, u64>>,
}

/// Wraps another provider and records how often snapshots are built and
/// files are read, so callers can assert on I/O volume.
pub struct CountingSnapshotProvider<P> {
    inner: P,
    counters: Arc<Counters>,
}

impl<P: SnapshotProvider> CountingSnapshotProvider<P> {
    /// Wrap `inner`.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            counters: Arc::default(),
        }
    }

    /// Number of snapshots successfully handed out.
    #[must_use]
    pub fn snapshots_built(&self) -> u64 {
        self.counters.snapshots.load(Ordering::SeqCst)
    }

    /// Number of reads of `path` across every snapshot.
    #[must_use]
    pub fn reads_of(&self, path: impl AsRef<Utf8Path>) -> u64 {
        self.counters
            .reads
            .lock()
            .map_or(0, |reads| reads.get(path.as_ref()).copied().unwrap_or(0))
    }

    /// Total reads across every path and snapshot.
    #[must_use]
    pub fn total_reads(&self) -> u64 {
        self.counters
            .reads
            .lock()
            .map_or(0, |reads| reads.values().sum())
    }

    /// Forget every recorded count.
    pub fn reset(&self) {
        self.counters.snapshots.store(0, Ordering::SeqCst);
        if let Ok(mut reads) = self.counters.reads.lock() {
            reads.clear();
        }
    }
}

impl<P: SnapshotProvider> SnapshotProvider for CountingSnapshotProvider<P> {
    fn snapshot(&self, branch: Branch) -> ProviderResult<Arc<dyn Snapshot>> {
        let inner = self.inner.snapshot(branch)?;
        self.counters.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CountingSnapshot {
            inner,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct CountingSnapshot {
    inner: Arc<dyn Snapshot>,
    counters: Arc<Counters>,
}

impl Snapshot for CountingSnapshot {
    fn read(&self, path: &Utf8Path) -> ProviderResult<Option<Vec<u8>>> {
        if let Ok(mut reads) = self.counters.reads.lock() {
            *reads.entry(path.to_owned()).or_default() += 1;
        }
        self.inner.read(path)
    }

    fn stat(&self, path: &Utf8Path) -> ProviderResult<Option<Stat>> {
        self.inner.stat(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySnapshot, MemorySnapshotProvider};

    #[test]
    fn reads_are_counted_per_path_but_stats_are_not() {
        let provider = CountingSnapshotProvider::new(
            MemorySnapshotProvider::new()
                .with_branch(Branch::Trunk, MemorySnapshot::new().with_file("a.json", "{}")),
        );
        let snapshot = provider.snapshot(Branch::Trunk).expect("trunk snapshot");
        snapshot.stat(Utf8Path::new("a.json")).expect("stat");
        snapshot.read(Utf8Path::new("a.json")).expect("read");
        snapshot.read(Utf8Path::new("a.json")).expect("read");
        snapshot.read(Utf8Path::new("b.json")).expect("read");

        assert_eq!(provider.snapshots_built(), 1);
        assert_eq!(provider.reads_of("a.json"), 2);
        assert_eq!(provider.total_reads(), 3);

        provider.reset();
        assert_eq!(provider.total_reads(), 0);
    }

    #[test]
    fn failed_snapshots_are_not_counted() {
        let provider = CountingSnapshotProvider::new(MemorySnapshotProvider::new());
        assert!(provider.snapshot(Branch::Number(1)).is_err());
        assert_eq!(provider.snapshots_built(), 0);
    }
}
