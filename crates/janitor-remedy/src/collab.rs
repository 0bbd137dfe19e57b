//! Collaborator seams the remediation engine drives.
//!
//! The GitHub-backed implementations live in `janitor-github`; the git
//! implementation is [`crate::vcs::GitWorkspace`].

use std::path::Path;

use async_trait::async_trait;
use janitor_core::JanitorError;

/// A comment on the pull request conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrComment {
    pub author: String,
    /// Posted by an app or bot account.
    pub is_bot: bool,
    pub body: String,
}

/// Which run's logs to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// A specific workflow run.
    Run(u64),
    /// The newest failed run against the pull request's head commit.
    PullRequest(u64),
}

#[async_trait]
pub trait CiLogSource: Send + Sync {
    /// Concatenated text of every log file in the run, without separators.
    async fn fetch_logs(&self, target: LogTarget) -> Result<String, JanitorError>;
}

/// Append-only pull request conversation.
#[async_trait]
pub trait PullRequestThread: Send + Sync {
    async fn list_comments(&self, pr: u64) -> Result<Vec<PrComment>, JanitorError>;

    async fn post_comment(&self, pr: u64, body: &str) -> Result<(), JanitorError>;
}

/// Stage, commit, and push a single file.
///
/// Paths are relative to the workspace root.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Whether `path` differs from what `HEAD` records.
    async fn has_pending_changes(&self, path: &Path) -> Result<bool, JanitorError>;

    /// Stage only `path` and commit it; returns the new commit id.
    async fn commit_file(&self, path: &Path, message: &str) -> Result<String, JanitorError>;

    /// `HEAD`'s commit id when it holds work `branch` on the remote has not
    /// received yet, such as a fix committed by a run whose push failed.
    async fn unpushed_head(&self, branch: &str) -> Result<Option<String>, JanitorError>;

    /// Push `HEAD` to `branch` on the configured remote.
    async fn push(&self, branch: &str) -> Result<(), JanitorError>;
}
