use std::fmt;
use std::path::{Path, PathBuf};

use janitor_core::{ApprovalState, FailureKind, Finding, JanitorConfig, JanitorError, RunContext};
use janitor_logscan::Classifier;
use serde::Serialize;
use tracing::info;

use crate::collab::{CiLogSource, LogTarget, PullRequestThread, VersionControl};
use crate::gate::ApprovalGate;
use crate::manifest::{DependencyManifest, ManifestChange};
use crate::messages;
use crate::request::{display_path, manifest_entry, RemediationRequest};

/// Terminal action taken by one invocation.
///
/// # Examples
///
/// ```
/// use janitor_remedy::engine::RemediationOutcome;
///
/// let outcome = RemediationOutcome::NoKnownFix;
/// let json = serde_json::to_value(&outcome).unwrap();
/// assert_eq!(json["action"], "no-known-fix");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RemediationOutcome {
    /// Diagnosis posted; waiting for a human to comment the token.
    ApprovalRequested { kind: FailureKind, token: String },
    /// Missing dependency handled. `commit` is `None` when nothing was pending.
    FixApplied {
        package: String,
        manifest_changed: bool,
        commit: Option<String>,
    },
    /// Approved runtime conflict; guidance posted, repository untouched.
    GuidancePosted { kind: FailureKind },
    /// Nothing recognizable in the logs.
    NoKnownFix,
}

impl fmt::Display for RemediationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemediationOutcome::ApprovalRequested { kind, token } => {
                write!(f, "{kind}: approval requested (comment `{token}`)")
            }
            RemediationOutcome::FixApplied {
                package,
                manifest_changed,
                commit,
            } => {
                let manifest = if *manifest_changed {
                    "manifest updated"
                } else {
                    "manifest unchanged"
                };
                match commit {
                    Some(id) => write!(f, "fixed missing dependency {package}: {manifest}, pushed {id}"),
                    None => write!(f, "fixed missing dependency {package}: {manifest}, nothing to commit"),
                }
            }
            RemediationOutcome::GuidancePosted { kind } => {
                write!(f, "{kind}: manual guidance posted, no changes made")
            }
            RemediationOutcome::NoKnownFix => write!(f, "no supported fix detected"),
        }
    }
}

/// Drives classify → decide → act for a single pull request.
pub struct RemediationEngine<'a> {
    config: &'a JanitorConfig,
    classifier: Classifier,
    gate: ApprovalGate,
    logs: &'a dyn CiLogSource,
    thread: &'a dyn PullRequestThread,
    vcs: &'a dyn VersionControl,
    workspace_root: PathBuf,
}

impl<'a> RemediationEngine<'a> {
    pub fn new(
        config: &'a JanitorConfig,
        logs: &'a dyn CiLogSource,
        thread: &'a dyn PullRequestThread,
        vcs: &'a dyn VersionControl,
        workspace_root: &Path,
    ) -> Self {
        Self {
            config,
            classifier: Classifier::new(&config.classify),
            gate: ApprovalGate::new(&config.approval),
            logs,
            thread,
            vcs,
            workspace_root: workspace_root.to_path_buf(),
        }
    }

    /// Full pipeline for pull request `pr`.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures and [`JanitorError::Resolution`]
    /// when an approved fix has no branch to push to.
    pub async fn run(&self, ctx: &RunContext, pr: u64) -> Result<RemediationOutcome, JanitorError> {
        let target = match ctx.run_id {
            Some(id) => LogTarget::Run(id),
            None => LogTarget::PullRequest(pr),
        };
        let logs = self.logs.fetch_logs(target).await?;
        info!(bytes = logs.len(), ?target, "fetched CI logs");

        match self.classifier.classify(&logs) {
            Some(finding) => self.remediate(ctx, pr, finding).await,
            None => {
                info!("no recognizable failure in logs");
                self.thread.post_comment(pr, &messages::no_known_fix()).await?;
                Ok(RemediationOutcome::NoKnownFix)
            }
        }
    }

    /// Act on an already classified finding.
    pub async fn remediate(
        &self,
        ctx: &RunContext,
        pr: u64,
        finding: Finding,
    ) -> Result<RemediationOutcome, JanitorError> {
        info!(kind = %finding.kind, line = finding.evidence.line, "classified failure");
        let request = RemediationRequest::new(finding, self.config);
        let state = self.approval_state(ctx, pr, &request).await?;
        info!(kind = %request.finding.kind, ?state, "approval decided");

        match (request.finding.kind, state) {
            (FailureKind::MissingDependency, ApprovalState::Unapproved) => {
                let body = messages::missing_dependency_diagnosis(&request);
                self.thread.post_comment(pr, &body).await?;
                Ok(approval_requested(request))
            }
            (FailureKind::MissingDependency, ApprovalState::Approved) => {
                self.apply_missing_dependency(ctx, pr, &request).await
            }
            (FailureKind::RuntimeVersionConflict, ApprovalState::Unapproved) => {
                let body = messages::runtime_conflict_diagnosis(&request, &ctx.runtime_label);
                self.thread.post_comment(pr, &body).await?;
                Ok(approval_requested(request))
            }
            (FailureKind::RuntimeVersionConflict, ApprovalState::Approved) => {
                let body = messages::runtime_conflict_guidance(&request, &ctx.runtime_label);
                self.thread.post_comment(pr, &body).await?;
                Ok(RemediationOutcome::GuidancePosted {
                    kind: request.finding.kind,
                })
            }
        }
    }

    async fn approval_state(
        &self,
        ctx: &RunContext,
        pr: u64,
        request: &RemediationRequest,
    ) -> Result<ApprovalState, JanitorError> {
        let kind = request.finding.kind;
        if self.gate.signal_approves(kind, ctx.approval) {
            return Ok(ApprovalState::Approved);
        }

        let bot_login = &self.config.github.bot_login;
        let bodies: Vec<String> = self
            .thread
            .list_comments(pr)
            .await?
            .into_iter()
            .filter(|c| !c.is_bot && !c.author.eq_ignore_ascii_case(bot_login))
            .map(|c| c.body)
            .collect();
        Ok(self.gate.decide_from_comments(kind, &bodies))
    }

    async fn apply_missing_dependency(
        &self,
        ctx: &RunContext,
        pr: u64,
        request: &RemediationRequest,
    ) -> Result<RemediationOutcome, JanitorError> {
        let branch = ctx
            .branch
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                JanitorError::Resolution(
                    "fix approved but no PR branch was provided (set PR_BRANCH)".into(),
                )
            })?;

        let package = manifest_entry(&request.finding).to_string();
        let relative = self.config.manifest.path.as_path();
        let manifest = DependencyManifest::new(self.workspace_root.join(relative));
        let change = manifest.add(&package)?;

        let commit = if self.vcs.has_pending_changes(relative).await? {
            let message = format!("ci-fix: add missing dependency {package}");
            let id = self.vcs.commit_file(relative, &message).await?;
            self.vcs.push(branch).await?;
            Some(id)
        } else if let Some(id) = self.vcs.unpushed_head(branch).await? {
            info!(package = %package, commit = %id, "pushing fix left unpushed by an earlier run");
            self.vcs.push(branch).await?;
            Some(id)
        } else {
            info!(package = %package, "manifest has no pending changes, skipping commit");
            None
        };

        let body = messages::fix_applied(&package, &display_path(relative), change, commit.as_deref());
        self.thread.post_comment(pr, &body).await?;

        Ok(RemediationOutcome::FixApplied {
            package,
            manifest_changed: change == ManifestChange::Added,
            commit,
        })
    }
}

fn approval_requested(request: RemediationRequest) -> RemediationOutcome {
    RemediationOutcome::ApprovalRequested {
        kind: request.finding.kind,
        token: request.approval_token,
    }
}
