//! Core library for resolving API availability across release history.
//!
//! The crate is layered around four responsibilities:
//! - translating between release channels and numeric milestones
//! - walking per-revision snapshots of the source tree
//! - diffing API schema documents into first-seen node graphs
//! - resolving namespace and node availability from the above

#![warn(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::pedantic,
    missing_docs
)]
#![cfg_attr(
    not(test),
    deny(
        clippy::dbg_macro,
        clippy::expect_used,
        clippy::panic,
        clippy::print_stderr,
        clippy::print_stdout,
        clippy::todo,
        clippy::unwrap_used
    )
)]

/// Namespace and node availability queries.
pub mod availability;
/// Channel catalog documents and release feed parsing.
pub mod catalog;
/// Channel/milestone translation table.
pub mod channel;
/// Finder, repository and application configuration.
pub mod config;
/// JSON document parsing shared by schema and features files.
pub mod document;
/// Features file parsing and platform filtering.
pub mod features;
/// Historical snapshot iteration.
pub mod history;
/// API filename and namespace conversions.
pub mod namespace;
/// Git-backed snapshot provider.
pub mod repository;
/// First-seen schema node graphs.
pub mod schema_graph;

pub use avail_api::{
    AvailabilityInfo, Branch, Channel, ChannelInfo, LookupResult, Milestone, Platform,
};
pub use availability::AvailabilityFinder;
pub use catalog::ChannelCatalog;
pub use channel::ChannelMapper;
pub use config::{AppConfig, FinderConfig, MetadataEpochs, RepositoryConfig};
pub use history::{Direction, HistoryIterator};
pub use namespace::namespace_from_filename;
pub use repository::GitSnapshotProvider;
pub use schema_graph::{NodeMark, SchemaGraph};

use avail_provider_api::ProviderError;
use document::MalformedDocument;

/// Common result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A schema, features or overrides document could not be parsed.
    #[error("malformed document {path}: {source}")]
    MalformedSchema {
        /// Path of the document inside the snapshot.
        path: String,
        /// Parser detail.
        #[source]
        source: MalformedDocument,
    },
    /// The queried milestone or entity has no record in history.
    #[error("no record of {what}")]
    NotFound {
        /// Description of the missing entity.
        what: String,
    },
    /// A snapshot read failed inside a visited revision.
    #[error("snapshot provider error: {source}")]
    Provider {
        /// Error reported by the provider.
        #[from]
        source: ProviderError,
    },
    /// The channel catalog is inconsistent or unreadable.
    #[error("invalid channel catalog: {0}")]
    Catalog(String),
    /// A configuration file is invalid.
    #[error("invalid configuration {path}: {message}")]
    Config {
        /// Path of the configuration source.
        path: String,
        /// What was wrong with it.
        message: String,
    },
    /// Underlying git operation failed.
    #[error("git error: {source}")]
    Git {
        /// Original libgit2 error.
        #[from]
        source: git2::Error,
    },
    /// Provided path does not correspond to a git repository.
    #[error("path does not reference a git repository: {path}")]
    NotARepository {
        /// Path that failed to resolve to a repository.
        path: String,
    },
    /// Filesystem interaction failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Filesystem path involved in the failed operation.
        path: String,
        /// Source I/O error returned by the standard library.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn malformed(path: impl ToString, source: MalformedDocument) -> Self {
        Self::MalformedSchema {
            path: path.to_string(),
            source,
        }
    }
}
