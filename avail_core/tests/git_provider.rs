use std::fs;
use std::path::Path;
use std::sync::Arc;

use avail_core::catalog::{ChannelCatalog, ChannelHead, ChannelHeads};
use avail_core::config::{FinderConfig, RepositoryConfig};
use avail_core::{
    AvailabilityFinder, Branch, ChannelInfo, ChannelMapper, Error, GitSnapshotProvider, Platform,
    Result,
};
use avail_provider_api::{ProviderError, SnapshotProvider};
use camino::Utf8Path;
use git2::{IndexAddOption, Oid, Repository as GitRepository};
use tempfile::TempDir;

const TABS: &str = "chrome/common/extensions/api/tabs.json";

#[test]
fn snapshots_follow_branch_references() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let git_repo = GitRepository::init(temp.path()).map_err(Error::from)?;

    write_file(temp.path(), TABS, r#"[{"namespace": "tabs"}]"#);
    let old = commit_all(&git_repo, "tabs")?;
    write_file(temp.path(), TABS, r#"[{"namespace": "tabs", "functions": [{"name": "get"}]}]"#);
    let new = commit_all(&git_repo, "tabs.get")?;

    point(&git_repo, "refs/heads/branch-heads/1180", old)?;
    point(&git_repo, "refs/heads/main", new)?;

    let provider = GitSnapshotProvider::open(temp.path(), RepositoryConfig::default())?;
    let path = Utf8Path::new(TABS);
    let branch = provider.snapshot(Branch::Number(1180))?;
    let trunk = provider.snapshot(Branch::Trunk)?;

    let old_bytes = branch.read(path)?.expect("tabs on branch");
    assert_eq!(old_bytes, br#"[{"namespace": "tabs"}]"#);
    assert!(trunk.read(path)?.expect("tabs on trunk").len() > old_bytes.len());
    assert_ne!(branch.stat(path)?, trunk.stat(path)?);
    assert!(branch.stat(path)?.is_some());

    assert_eq!(trunk.read(Utf8Path::new("missing.json"))?, None);
    assert_eq!(trunk.stat(Utf8Path::new("missing.json"))?, None);
    assert_eq!(
        trunk.read(Utf8Path::new("chrome/common/extensions/api"))?,
        None
    );

    assert!(matches!(
        provider.snapshot(Branch::Number(1229)),
        Err(ProviderError::BranchUnavailable {
            branch: Branch::Number(1229)
        })
    ));
    Ok(())
}

#[test]
fn unchanged_files_keep_their_stat_across_commits() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let git_repo = GitRepository::init(temp.path()).map_err(Error::from)?;

    write_file(temp.path(), TABS, r#"[{"namespace": "tabs"}]"#);
    let first = commit_all(&git_repo, "tabs")?;
    write_file(temp.path(), "README.md", "unrelated\n");
    let second = commit_all(&git_repo, "readme")?;

    point(&git_repo, "refs/heads/branch-heads/1", first)?;
    point(&git_repo, "refs/heads/branch-heads/2", second)?;

    let provider = GitSnapshotProvider::open(temp.path(), RepositoryConfig::default())?;
    let path = Utf8Path::new(TABS);
    assert_eq!(
        provider.snapshot(Branch::Number(1))?.stat(path)?,
        provider.snapshot(Branch::Number(2))?.stat(path)?
    );
    Ok(())
}

#[test]
fn custom_reference_patterns_are_honoured() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let git_repo = GitRepository::init(temp.path()).map_err(Error::from)?;
    write_file(temp.path(), TABS, "[]");
    let commit = commit_all(&git_repo, "base")?;
    point(&git_repo, "refs/remotes/origin/release-7", commit)?;

    let config = RepositoryConfig {
        trunk_ref: "refs/remotes/origin/trunk".into(),
        branch_ref_pattern: "refs/remotes/origin/release-{branch}".into(),
    };
    let provider = GitSnapshotProvider::open(temp.path(), config)?;
    assert!(provider.snapshot(Branch::Number(7)).is_ok());
    assert!(provider.snapshot(Branch::Trunk).is_err());
    Ok(())
}

#[test]
fn provider_opens_from_nested_paths_and_bare_repositories() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    GitRepository::init(temp.path()).map_err(Error::from)?;
    let nested = temp.path().join("nested/deeper");
    fs::create_dir_all(&nested).expect("nested dirs");

    let provider = GitSnapshotProvider::open(&nested, RepositoryConfig::default())?;
    let root = provider.root().canonicalize().expect("canonical root");
    assert_eq!(root, temp.path().canonicalize().expect("canonical temp path"));

    let bare_path = temp.path().join("bare.git");
    GitRepository::init_bare(&bare_path).map_err(Error::from)?;
    assert!(GitSnapshotProvider::open(&bare_path, RepositoryConfig::default()).is_ok());
    Ok(())
}

#[test]
fn finder_resolves_against_git_history() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let git_repo = GitRepository::init(temp.path()).map_err(Error::from)?;

    write_file(temp.path(), "README.md", "no apis yet\n");
    let m20 = commit_all(&git_repo, "milestone 20")?;
    write_file(temp.path(), TABS, r#"[{"namespace": "tabs"}]"#);
    let m21 = commit_all(&git_repo, "milestone 21")?;
    write_file(
        temp.path(),
        TABS,
        r#"[{"namespace": "tabs", "functions": [{"name": "getCurrent"}]}]"#,
    );
    let m22 = commit_all(&git_repo, "milestone 22")?;

    point(&git_repo, "refs/heads/branch-heads/1132", m20)?;
    point(&git_repo, "refs/heads/branch-heads/1180", m21)?;
    point(&git_repo, "refs/heads/branch-heads/1229", m22)?;
    point(&git_repo, "refs/heads/main", m22)?;

    let heads = ChannelHeads {
        stable: ChannelHead::new(1229, 22),
        beta: None,
        dev: None,
    };
    let history = [(20, 1132), (21, 1180)].into_iter().collect();
    let mapper = Arc::new(ChannelMapper::new(ChannelCatalog::new(history, heads)?)?);
    let provider = GitSnapshotProvider::open(temp.path(), RepositoryConfig::default())?;
    let finder = AvailabilityFinder::new(
        Arc::clone(&mapper),
        Arc::new(provider),
        FinderConfig::default(),
        Platform::Extensions,
    );

    let availability = finder.api_availability("tabs")?;
    assert_eq!(availability.channel_info, mapper.channel_info_for_milestone(21)?);

    let graph = finder.api_node_availability("tabs")?;
    assert_eq!(
        graph.lookup(["tabs", "functions", "getCurrent"]).channel_info,
        Some(mapper.channel_info_for_milestone(22)?)
    );
    assert_eq!(
        graph.lookup(["tabs"]).channel_info,
        Some(mapper.channel_info_for_milestone(21)?)
    );
    assert_ne!(availability.channel_info, ChannelInfo::trunk());
    Ok(())
}

fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dirs");
    }
    fs::write(path, contents).expect("write file");
}

fn commit_all(repo: &GitRepository, message: &str) -> Result<Oid> {
    let mut index = repo.index().map_err(Error::from)?;
    index
        .add_all(["*"], IndexAddOption::DEFAULT, None)
        .map_err(Error::from)?;
    index.write().map_err(Error::from)?;
    let tree_id = index.write_tree().map_err(Error::from)?;
    let tree = repo.find_tree(tree_id).map_err(Error::from)?;
    let signature =
        git2::Signature::now("Test User", "test@example.com").map_err(Error::from)?;

    let parents = match repo.head() {
        Ok(head) => head
            .peel_to_commit()
            .map_or_else(|_| Vec::new(), |parent| vec![parent]),
        Err(_) => Vec::new(),
    };
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parent_refs,
    )
    .map_err(Error::from)
}

fn point(repo: &GitRepository, name: &str, target: Oid) -> Result<()> {
    repo.reference(name, target, true, "test fixture")
        .map_err(Error::from)?;
    Ok(())
}
