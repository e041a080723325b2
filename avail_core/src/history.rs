//! Walks per-revision snapshots of the source tree, newest to oldest or the
//! other way round.

use std::sync::Arc;

use avail_provider_api::{Snapshot, SnapshotProvider};
use tracing::{debug, warn};

use crate::channel::ChannelMapper;
use crate::{ChannelInfo, Result};

/// Walk direction through history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward trunk.
    Ascending,
    /// Toward the oldest known milestone.
    Descending,
}

/// Revisions visited by a walk, in order, starting with the start revision.
///
/// Every integer milestone between the start and the end bound is
/// considered; milestones the mapper cannot place are skipped.
#[derive(Debug, Clone)]
pub struct Revisions<'a> {
    mapper: &'a ChannelMapper,
    direction: Direction,
    next: Option<ChannelInfo>,
}

impl<'a> Revisions<'a> {
    /// Revisions from `start` in `direction`.
    #[must_use]
    pub const fn new(mapper: &'a ChannelMapper, start: ChannelInfo, direction: Direction) -> Self {
        Self {
            mapper,
            direction,
            next: Some(start),
        }
    }
}

impl Iterator for Revisions<'_> {
    type Item = ChannelInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = match self.direction {
            Direction::Ascending => self.mapper.newer(&current),
            Direction::Descending => self.mapper.older(&current),
        };
        Some(current)
    }
}

/// Pairs revisions with their snapshots and hands both to a visitor.
#[derive(Clone)]
pub struct HistoryIterator {
    mapper: Arc<ChannelMapper>,
    provider: Arc<dyn SnapshotProvider>,
}

impl HistoryIterator {
    /// Create an iterator over `provider`'s snapshots.
    #[must_use]
    pub fn new(mapper: Arc<ChannelMapper>, provider: Arc<dyn SnapshotProvider>) -> Self {
        Self { mapper, provider }
    }

    /// Revision sequence of a walk without building any snapshots.
    #[must_use]
    pub fn revisions(&self, start: ChannelInfo, direction: Direction) -> Revisions<'_> {
        Revisions::new(&self.mapper, start, direction)
    }

    /// Visit snapshots from `start` in `direction` until `visit` returns
    /// `false` or history runs out.
    ///
    /// Revisions whose snapshot cannot be built are skipped. Returns the last
    /// revision for which `visit` returned `true`.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `visit`.
    pub fn walk<F>(
        &self,
        start: ChannelInfo,
        direction: Direction,
        mut visit: F,
    ) -> Result<Option<ChannelInfo>>
    where
        F: FnMut(&dyn Snapshot, &ChannelInfo) -> Result<bool>,
    {
        let mut last = None;
        for info in self.revisions(start, direction) {
            let snapshot = match self.provider.snapshot(info.branch()) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!("skipping {}: {}", info, err);
                    continue;
                }
            };
            if !visit(snapshot.as_ref(), &info)? {
                debug!("walk stopped at {}", info);
                break;
            }
            last = Some(info);
        }
        Ok(last)
    }

    /// [`HistoryIterator::walk`] toward trunk.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `visit`.
    pub fn ascending<F>(&self, start: ChannelInfo, visit: F) -> Result<Option<ChannelInfo>>
    where
        F: FnMut(&dyn Snapshot, &ChannelInfo) -> Result<bool>,
    {
        self.walk(start, Direction::Ascending, visit)
    }

    /// [`HistoryIterator::walk`] toward the oldest milestone.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `visit`.
    pub fn descending<F>(&self, start: ChannelInfo, visit: F) -> Result<Option<ChannelInfo>>
    where
        F: FnMut(&dyn Snapshot, &ChannelInfo) -> Result<bool>,
    {
        self.walk(start, Direction::Descending, visit)
    }
}
