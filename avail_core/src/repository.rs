//! Snapshot provider backed by a git repository through libgit2.
//!
//! Trunk and numbered branches resolve to references named by
//! [`RepositoryConfig`]; file contents come from the referenced commit's
//! tree and a file's stat is its object id.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use avail_provider_api::{ProviderError, ProviderResult, Snapshot, SnapshotProvider, Stat};
use camino::Utf8Path;
use git2::{ErrorClass, ErrorCode, ObjectType, Oid, Repository as GitRepository};
use tracing::debug;

use crate::config::RepositoryConfig;
use crate::{Branch, Error, Result};

/// Serves one snapshot per branch reference of a local repository.
pub struct GitSnapshotProvider {
    repo: Arc<Mutex<GitRepository>>,
    root: PathBuf,
    config: RepositoryConfig,
}

impl GitSnapshotProvider {
    /// Open the repository containing `path`. Bare repositories are
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the path cannot be canonicalized,
    /// [`Error::NotARepository`] if no repository contains it, or
    /// [`Error::Git`] for other libgit2 failures.
    pub fn open(path: impl AsRef<Path>, config: RepositoryConfig) -> Result<Self> {
        let original = path.as_ref();
        let canonical = std::fs::canonicalize(original).map_err(|source| Error::Io {
            path: display_path(original),
            source,
        })?;

        let repo = match GitRepository::discover(&canonical) {
            Ok(repo) => repo,
            Err(err)
                if err.class() == ErrorClass::Repository && err.code() == ErrorCode::NotFound =>
            {
                return Err(Error::NotARepository {
                    path: display_path(&canonical),
                })
            }
            Err(err) => return Err(Error::from(err)),
        };

        let root = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .to_path_buf();

        Ok(Self {
            repo: Arc::new(Mutex::new(repo)),
            root,
            config,
        })
    }

    /// Repository root: the work tree, or the git directory when bare.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reference a branch resolves to.
    #[must_use]
    pub fn reference_name(&self, branch: Branch) -> String {
        match branch {
            Branch::Trunk => self.config.trunk_ref.clone(),
            Branch::Number(number) => self.config.branch_ref(number),
        }
    }
}

impl SnapshotProvider for GitSnapshotProvider {
    fn snapshot(&self, branch: Branch) -> ProviderResult<Arc<dyn Snapshot>> {
        let name = self.reference_name(branch);
        let repo = lock(&self.repo)?;
        let reference = match repo.find_reference(&name) {
            Ok(reference) => reference,
            Err(err) if err.code() == ErrorCode::NotFound => {
                debug!("reference {} not found", name);
                return Err(ProviderError::BranchUnavailable { branch });
            }
            Err(err) => return Err(backend(&err)),
        };
        let tree = reference
            .peel_to_commit()
            .and_then(|commit| commit.tree())
            .map_err(|err| backend(&err))?;

        Ok(Arc::new(GitSnapshot {
            repo: Arc::clone(&self.repo),
            tree: tree.id(),
        }))
    }
}

impl fmt::Debug for GitSnapshotProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitSnapshotProvider")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Files of one commit tree.
struct GitSnapshot {
    repo: Arc<Mutex<GitRepository>>,
    tree: Oid,
}

impl GitSnapshot {
    fn entry_id(
        repo: &GitRepository,
        tree: Oid,
        path: &Utf8Path,
    ) -> ProviderResult<Option<(Oid, Option<ObjectType>)>> {
        let tree = repo.find_tree(tree).map_err(|err| backend(&err))?;
        match tree.get_path(path.as_std_path()) {
            Ok(entry) => Ok(Some((entry.id(), entry.kind()))),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(read_error(path, &err)),
        }
    }
}

impl Snapshot for GitSnapshot {
    fn read(&self, path: &Utf8Path) -> ProviderResult<Option<Vec<u8>>> {
        let repo = lock(&self.repo)?;
        let Some((id, kind)) = Self::entry_id(&repo, self.tree, path)? else {
            return Ok(None);
        };
        if kind != Some(ObjectType::Blob) {
            return Ok(None);
        }
        let blob = repo.find_blob(id).map_err(|err| read_error(path, &err))?;
        Ok(Some(blob.content().to_vec()))
    }

    fn stat(&self, path: &Utf8Path) -> ProviderResult<Option<Stat>> {
        let repo = lock(&self.repo)?;
        Ok(Self::entry_id(&repo, self.tree, path)?.map(|(id, _)| Stat::new(id.to_string())))
    }
}

fn lock(repo: &Mutex<GitRepository>) -> ProviderResult<MutexGuard<'_, GitRepository>> {
    repo.lock()
        .map_err(|_| ProviderError::Backend("repository lock poisoned".into()))
}

fn backend(err: &git2::Error) -> ProviderError {
    ProviderError::Backend(err.message().to_owned())
}

fn read_error(path: &Utf8Path, err: &git2::Error) -> ProviderError {
    ProviderError::Read {
        path: path.to_string(),
        message: err.message().to_owned(),
    }
}

fn display_path(path: &Path) -> String {
    path.to_path_buf()
        .into_os_string()
        .to_string_lossy()
        .into_owned()
}
