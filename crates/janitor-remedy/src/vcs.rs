//! Git workspace operations via git2, with `git push` shelled out.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use git2::{Commit, ErrorCode, Repository, Signature, Status};
use janitor_core::{with_retry, GitConfig, JanitorError, NetworkConfig};
use tracing::{debug, info};

use crate::collab::VersionControl;

/// The checked-out pull request branch the janitor runs inside.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use janitor_core::{GitConfig, NetworkConfig};
/// use janitor_remedy::vcs::GitWorkspace;
///
/// let ws = GitWorkspace::open(Path::new("."), &GitConfig::default(), &NetworkConfig::default()).unwrap();
/// ```
pub struct GitWorkspace {
    root: PathBuf,
    git: GitConfig,
    network: NetworkConfig,
}

impl GitWorkspace {
    /// Open the repository whose working directory is `root`.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Git`] if `root` is not a git working tree.
    pub fn open(root: &Path, git: &GitConfig, network: &NetworkConfig) -> Result<Self, JanitorError> {
        let repo = Repository::open(root).map_err(git_err)?;
        let root = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| JanitorError::Git(format!("{} is a bare repository", root.display())))?;
        Ok(Self {
            root,
            git: git.clone(),
            network: network.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repo(&self) -> Result<Repository, JanitorError> {
        Repository::open(&self.root).map_err(git_err)
    }

    async fn push_once(&self, branch: &str) -> Result<(), JanitorError> {
        let refspec = format!("HEAD:refs/heads/{branch}");
        let output = tokio::process::Command::new("git")
            .current_dir(&self.root)
            .args(["push", &self.git.remote, &refspec])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| JanitorError::Git(format!("failed to execute git push: {e}")))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(JanitorError::Network(format!(
                "git push to {} failed: {}",
                self.git.remote,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[async_trait]
impl VersionControl for GitWorkspace {
    async fn has_pending_changes(&self, path: &Path) -> Result<bool, JanitorError> {
        let repo = self.repo()?;
        let status = match repo.status_file(path) {
            Ok(status) => status,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(false),
            Err(e) => return Err(git_err(e)),
        };
        debug!(path = %path.display(), ?status, "manifest status");
        Ok(!status.is_empty() && !status.contains(Status::IGNORED))
    }

    async fn commit_file(&self, path: &Path, message: &str) -> Result<String, JanitorError> {
        let repo = self.repo()?;
        let mut index = repo.index().map_err(git_err)?;
        index.add_path(path).map_err(git_err)?;
        index.write().map_err(git_err)?;

        let tree_id = index.write_tree().map_err(git_err)?;
        let tree = repo.find_tree(tree_id).map_err(git_err)?;
        let sig = Signature::now(&self.git.bot_name, &self.git.bot_email).map_err(git_err)?;

        let parents: Vec<Commit<'_>> = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().map_err(git_err)?],
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Vec::new()
            }
            Err(e) => return Err(git_err(e)),
        };
        let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();

        let oid = repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .map_err(git_err)?;
        info!(commit = %oid, path = %path.display(), "committed manifest");
        Ok(oid.to_string())
    }

    async fn unpushed_head(&self, branch: &str) -> Result<Option<String>, JanitorError> {
        let repo = self.repo()?;
        let head = match repo.head() {
            Ok(head) => head.peel_to_commit().map_err(git_err)?,
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Ok(None)
            }
            Err(e) => return Err(git_err(e)),
        };

        let tracking = format!("refs/remotes/{}/{branch}", self.git.remote);
        let ahead = match repo.refname_to_id(&tracking) {
            Ok(remote_id) => {
                let (ahead, _behind) = repo
                    .graph_ahead_behind(head.id(), remote_id)
                    .map_err(git_err)?;
                ahead > 0
            }
            // No record of the remote branch: only our own commit counts as unpushed.
            Err(e) if e.code() == ErrorCode::NotFound => {
                head.author().email() == Some(self.git.bot_email.as_str())
            }
            Err(e) => return Err(git_err(e)),
        };
        debug!(branch, %tracking, ahead, "checked for unpushed commits");
        Ok(ahead.then(|| head.id().to_string()))
    }

    async fn push(&self, branch: &str) -> Result<(), JanitorError> {
        if branch.trim().is_empty() {
            return Err(JanitorError::Resolution("empty branch name".into()));
        }
        with_retry(&self.network, "git push", || self.push_once(branch)).await?;
        info!(branch, remote = %self.git.remote, "pushed fix");
        Ok(())
    }
}

fn git_err(e: git2::Error) -> JanitorError {
    JanitorError::Git(e.message().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> (tempfile::TempDir, GitWorkspace) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "flask\n").unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new("requirements.txt")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("dev", "dev@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap();

        let ws = GitWorkspace::open(dir.path(), &GitConfig::default(), &NetworkConfig::default())
            .unwrap();
        (dir, ws)
    }

    #[tokio::test]
    async fn clean_manifest_has_no_pending_changes() {
        let (_dir, ws) = init_repo();
        assert!(!ws
            .has_pending_changes(Path::new("requirements.txt"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn commit_uses_bot_identity_and_clears_status() {
        let (dir, ws) = init_repo();
        std::fs::write(dir.path().join("requirements.txt"), "flask\nrequests\n").unwrap();
        let manifest = Path::new("requirements.txt");
        assert!(ws.has_pending_changes(manifest).await.unwrap());

        let id = ws
            .commit_file(manifest, "ci-fix: add missing dependency requests")
            .await
            .unwrap();
        assert!(!ws.has_pending_changes(manifest).await.unwrap());

        let repo = Repository::open(dir.path()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.id().to_string(), id);
        assert_eq!(head.author().name(), Some("ci-janitor-bot"));
        assert_eq!(
            head.author().email(),
            Some("ci-janitor@users.noreply.github.com")
        );
        assert_eq!(
            head.message(),
            Some("ci-fix: add missing dependency requests")
        );
        assert_eq!(head.parent_count(), 1);
    }

    #[tokio::test]
    async fn commit_stages_only_the_named_file() {
        let (dir, ws) = init_repo();
        std::fs::write(dir.path().join("requirements.txt"), "flask\nrequests\n").unwrap();
        std::fs::write(dir.path().join("scratch.txt"), "local notes\n").unwrap();

        ws.commit_file(Path::new("requirements.txt"), "fix")
            .await
            .unwrap();

        let repo = Repository::open(dir.path()).unwrap();
        let status = repo.status_file(Path::new("scratch.txt")).unwrap();
        assert!(status.contains(Status::WT_NEW));
    }

    #[tokio::test]
    async fn new_untracked_manifest_is_pending() {
        let (dir, ws) = init_repo();
        std::fs::write(dir.path().join("extra-requirements.txt"), "requests\n").unwrap();
        assert!(ws
            .has_pending_changes(Path::new("extra-requirements.txt"))
            .await
            .unwrap());
    }

    fn with_bare_origin(dir: &tempfile::TempDir) -> tempfile::TempDir {
        let remote = tempfile::tempdir().unwrap();
        Repository::init_bare(remote.path()).unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        repo.remote("origin", remote.path().to_str().unwrap())
            .unwrap();
        remote
    }

    #[tokio::test]
    async fn push_updates_branch_on_remote() {
        let (dir, ws) = init_repo();
        let remote = with_bare_origin(&dir);
        std::fs::write(dir.path().join("requirements.txt"), "flask\nrequests\n").unwrap();
        let id = ws
            .commit_file(Path::new("requirements.txt"), "ci-fix: add missing dependency requests")
            .await
            .unwrap();

        ws.push("feature").await.unwrap();

        let bare = Repository::open_bare(remote.path()).unwrap();
        let pushed = bare.refname_to_id("refs/heads/feature").unwrap();
        assert_eq!(pushed.to_string(), id);
    }

    #[tokio::test]
    async fn push_to_missing_remote_is_a_network_error() {
        let (dir, _ws) = init_repo();
        let git = GitConfig {
            remote: "nowhere".into(),
            ..GitConfig::default()
        };
        let network = NetworkConfig {
            timeout_secs: 30,
            retries: 0,
        };
        let ws = GitWorkspace::open(dir.path(), &git, &network).unwrap();

        let result = ws.push("feature").await;
        assert!(matches!(result, Err(JanitorError::Network(_))));
    }

    #[tokio::test]
    async fn bot_commit_is_unpushed_until_push_succeeds() {
        let (dir, ws) = init_repo();
        let _remote = with_bare_origin(&dir);
        assert_eq!(ws.unpushed_head("feature").await.unwrap(), None);

        std::fs::write(dir.path().join("requirements.txt"), "flask\nrequests\n").unwrap();
        let id = ws
            .commit_file(Path::new("requirements.txt"), "fix")
            .await
            .unwrap();
        assert_eq!(ws.unpushed_head("feature").await.unwrap(), Some(id));

        ws.push("feature").await.unwrap();
        assert_eq!(ws.unpushed_head("feature").await.unwrap(), None);
    }

    #[tokio::test]
    async fn commit_ahead_of_tracking_ref_is_unpushed() {
        let (dir, ws) = init_repo();
        let _remote = with_bare_origin(&dir);
        ws.push("feature").await.unwrap();

        std::fs::write(dir.path().join("requirements.txt"), "flask\nrequests\n").unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("requirements.txt")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("dev", "dev@example.com").unwrap();
        let parent = repo.head().unwrap().peel_to_commit().unwrap();
        let oid = repo
            .commit(Some("HEAD"), &sig, &sig, "local", &tree, &[&parent])
            .unwrap();

        assert_eq!(
            ws.unpushed_head("feature").await.unwrap(),
            Some(oid.to_string())
        );
    }

    #[test]
    fn open_rejects_non_repository() {
        let dir = tempfile::tempdir().unwrap();
        let result = GitWorkspace::open(dir.path(), &GitConfig::default(), &NetworkConfig::default());
        assert!(matches!(result, Err(JanitorError::Git(_))));
    }
}
