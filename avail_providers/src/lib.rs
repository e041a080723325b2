//! In-memory collaborators for the availability resolver: snapshot
//! providers for fixtures and embedders, plus a process-local result cache.

mod cache;
mod counting;
mod memory;

pub use cache::MemoryResultCache;
pub use counting::CountingSnapshotProvider;
pub use memory::{MemorySnapshot, MemorySnapshotProvider};
