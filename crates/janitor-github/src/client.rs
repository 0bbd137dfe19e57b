use async_trait::async_trait;
use janitor_core::{split_repo, with_retry, JanitorConfig, JanitorError, NetworkConfig};
use janitor_remedy::collab::{CiLogSource, LogTarget, PrComment, PullRequestThread};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::archive::concat_log_archive;

const USER_AGENT: &str = "ci-janitor";
const COMMENTS_PER_PAGE: usize = 100;
const OPEN_PULLS_PER_PAGE: usize = 50;

#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowRun {
    pub id: u64,
    pub head_sha: String,
    #[serde(default)]
    pub pull_requests: Vec<PullRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PullRef {
    pub number: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowRunList {
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PullRequest {
    pub number: u64,
    pub head: Head,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Head {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssueComment {
    #[serde(default)]
    pub body: Option<String>,
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct User {
    pub login: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl From<IssueComment> for PrComment {
    fn from(c: IssueComment) -> Self {
        let (author, is_bot) = match c.user {
            Some(user) => {
                let is_bot = user.kind.eq_ignore_ascii_case("bot");
                (user.login, is_bot)
            }
            None => (String::new(), false),
        };
        PrComment {
            author,
            is_bot,
            body: c.body.unwrap_or_default(),
        }
    }
}

/// GitHub client for one repository: run logs, PR resolution, and comments.
///
/// # Examples
///
/// ```no_run
/// use janitor_core::JanitorConfig;
/// use janitor_github::GitHubClient;
///
/// let client = GitHubClient::new(Some("ghp_xxxx"), "octocat/hello-world", &JanitorConfig::default()).unwrap();
/// ```
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
    api_url: String,
    owner: String,
    repo: String,
    network: NetworkConfig,
}

impl GitHubClient {
    /// Create a client from an explicit token, `GITHUB_TOKEN`, or `GH_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Config`] if no token is available or `repo` is
    /// not `owner/name`, or [`JanitorError::GitHub`] if the client cannot be built.
    pub fn new(token: Option<&str>, repo: &str, config: &JanitorConfig) -> Result<Self, JanitorError> {
        let token = match token {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => std::env::var("GITHUB_TOKEN")
                .or_else(|_| std::env::var("GH_TOKEN"))
                .map_err(|_| {
                    JanitorError::Config(
                        "GITHUB_TOKEN not set. Pass --github-token or set GITHUB_TOKEN env var".into(),
                    )
                })?,
        };

        let (owner, name) = split_repo(repo)?;

        let api_url = config.github.api_url.trim_end_matches('/').to_string();
        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token.clone())
            .base_uri(api_url.as_str())
            .map_err(|e| JanitorError::GitHub(format!("invalid GitHub API url: {e}")))?
            .build()
            .map_err(|e| JanitorError::GitHub(format!("failed to create GitHub client: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.network.timeout())
            .build()
            .map_err(|e| JanitorError::GitHub(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            octocrab,
            http,
            token,
            api_url,
            owner: owner.to_string(),
            repo: name.to_string(),
            network: config.network.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}/{path}", self.api_url, self.owner, self.repo)
    }

    async fn get(&self, path: &str, accept: &str) -> Result<reqwest::Response, JanitorError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .header("Accept", accept)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|e| JanitorError::Network(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, path, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, JanitorError> {
        with_retry(&self.network, path, || async {
            self.get(path, "application/vnd.github+json")
                .await?
                .json::<T>()
                .await
                .map_err(|e| JanitorError::Network(format!("failed to decode {path}: {e}")))
        })
        .await
    }

    /// Determine which pull request this invocation is about.
    ///
    /// An explicit number wins. Otherwise the run's associated pull requests
    /// are used, then an open pull request whose head matches the run's
    /// head commit.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Resolution`] when no pull request can be found.
    pub async fn resolve_pr_number(
        &self,
        explicit: Option<u64>,
        run_id: Option<u64>,
    ) -> Result<u64, JanitorError> {
        if let Some(pr) = explicit {
            return Ok(pr);
        }
        let run_id = run_id.ok_or_else(|| {
            JanitorError::Resolution("neither a PR number nor a run id was provided".into())
        })?;

        let run: WorkflowRun = self.get_json(&format!("actions/runs/{run_id}")).await?;
        if let Some(pr) = run.pull_requests.first() {
            info!(pr = pr.number, run_id, "resolved PR from workflow run");
            return Ok(pr.number);
        }

        let open: Vec<PullRequest> = self
            .get_json(&format!("pulls?state=open&per_page={OPEN_PULLS_PER_PAGE}"))
            .await?;
        match match_head_sha(&open, &run.head_sha) {
            Some(number) => {
                info!(pr = number, sha = %run.head_sha, "resolved PR from head commit");
                Ok(number)
            }
            None => Err(JanitorError::Resolution(format!(
                "no open pull request has head commit {} (run {run_id})",
                run.head_sha
            ))),
        }
    }

    async fn latest_failed_run(&self, pr: u64) -> Result<u64, JanitorError> {
        let pull: PullRequest = self.get_json(&format!("pulls/{pr}")).await?;
        let runs: WorkflowRunList = self
            .get_json(&format!(
                "actions/runs?head_sha={}&status=failure&per_page=1",
                pull.head.sha
            ))
            .await?;
        runs.workflow_runs
            .first()
            .map(|r| r.id)
            .ok_or_else(|| {
                JanitorError::Resolution(format!(
                    "no failed workflow run for PR #{pr} at {}",
                    pull.head.sha
                ))
            })
    }

    async fn download_run_logs(&self, run_id: u64) -> Result<String, JanitorError> {
        let path = format!("actions/runs/{run_id}/logs");
        let bytes = with_retry(&self.network, &path, || async {
            self.get(&path, "application/vnd.github+json")
                .await?
                .bytes()
                .await
                .map_err(|e| JanitorError::Network(format!("failed to download {path}: {e}")))
        })
        .await?;
        info!(run_id, bytes = bytes.len(), "downloaded log archive");
        concat_log_archive(&bytes)
    }
}

#[async_trait]
impl CiLogSource for GitHubClient {
    async fn fetch_logs(&self, target: LogTarget) -> Result<String, JanitorError> {
        let run_id = match target {
            LogTarget::Run(id) => id,
            LogTarget::PullRequest(pr) => self.latest_failed_run(pr).await?,
        };
        self.download_run_logs(run_id).await
    }
}

#[async_trait]
impl PullRequestThread for GitHubClient {
    async fn list_comments(&self, pr: u64) -> Result<Vec<PrComment>, JanitorError> {
        let mut comments = Vec::new();
        let mut page = 1;
        loop {
            let batch: Vec<IssueComment> = self
                .get_json(&format!(
                    "issues/{pr}/comments?per_page={COMMENTS_PER_PAGE}&page={page}"
                ))
                .await?;
            let len = batch.len();
            comments.extend(batch.into_iter().map(PrComment::from));
            if len < COMMENTS_PER_PAGE {
                break;
            }
            page += 1;
        }
        debug!(pr, count = comments.len(), "fetched PR comments");
        Ok(comments)
    }

    async fn post_comment(&self, pr: u64, body: &str) -> Result<(), JanitorError> {
        let route = format!("/repos/{}/{}/issues/{pr}/comments", self.owner, self.repo);
        let payload = serde_json::json!({ "body": body });

        with_retry(&self.network, "post comment", || async {
            let _response: serde_json::Value = self
                .octocrab
                .post(route.as_str(), Some(&payload))
                .await
                .map_err(octocrab_err)?;
            Ok(())
        })
        .await?;
        info!(pr, chars = body.chars().count(), "posted PR comment");
        Ok(())
    }
}

fn match_head_sha(pulls: &[PullRequest], sha: &str) -> Option<u64> {
    pulls.iter().find(|p| p.head.sha == sha).map(|p| p.number)
}

fn status_error(status: StatusCode, path: &str, body: &str) -> JanitorError {
    let message = format!("GitHub API error {status} for {path}: {}", body.trim());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        JanitorError::Network(message)
    } else {
        JanitorError::GitHub(message)
    }
}

fn octocrab_err(e: octocrab::Error) -> JanitorError {
    match e {
        octocrab::Error::GitHub { .. } => JanitorError::GitHub(format!("failed to post comment: {e}")),
        other => JanitorError::Network(format!("failed to post comment: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_pull_requests() {
        let json = r#"{
            "id": 42,
            "head_sha": "abc123",
            "status": "completed",
            "pull_requests": [{"number": 7, "head": {"sha": "abc123"}}]
        }"#;
        let run: WorkflowRun = serde_json::from_str(json).unwrap();
        assert_eq!(run.id, 42);
        assert_eq!(run.pull_requests[0].number, 7);
    }

    #[test]
    fn parse_run_list() {
        let json = r#"{"total_count": 1, "workflow_runs": [{"id": 9, "head_sha": "f00"}]}"#;
        let runs: WorkflowRunList = serde_json::from_str(json).unwrap();
        assert_eq!(runs.workflow_runs[0].id, 9);
        assert!(runs.workflow_runs[0].pull_requests.is_empty());
    }

    #[test]
    fn head_sha_picks_matching_pull() {
        let json = r#"[
            {"number": 1, "head": {"sha": "aaa"}},
            {"number": 2, "head": {"sha": "bbb"}}
        ]"#;
        let pulls: Vec<PullRequest> = serde_json::from_str(json).unwrap();
        assert_eq!(match_head_sha(&pulls, "bbb"), Some(2));
        assert_eq!(match_head_sha(&pulls, "ccc"), None);
    }

    #[test]
    fn comment_marks_bot_accounts() {
        let json = r#"[
            {"body": "/ci-janitor approve", "user": {"login": "alice", "type": "User"}},
            {"body": "diagnosis", "user": {"login": "github-actions[bot]", "type": "Bot"}},
            {"body": null, "user": null}
        ]"#;
        let comments: Vec<PrComment> = serde_json::from_str::<Vec<IssueComment>>(json)
            .unwrap()
            .into_iter()
            .map(PrComment::from)
            .collect();
        assert_eq!(comments[0].author, "alice");
        assert!(!comments[0].is_bot);
        assert!(comments[1].is_bot);
        assert_eq!(comments[2].body, "");
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(status_error(StatusCode::BAD_GATEWAY, "pulls/1", "").is_transient());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "pulls/1", "").is_transient());
        assert!(!status_error(StatusCode::NOT_FOUND, "pulls/1", "").is_transient());
    }

    #[test]
    fn new_rejects_malformed_repo() {
        let result = GitHubClient::new(Some("token"), "not-a-repo", &JanitorConfig::default());
        assert!(matches!(result, Err(JanitorError::Config(_))));
    }

    #[tokio::test]
    async fn new_and_run_context_agree_on_repo_identifiers() {
        let config = JanitorConfig::default();
        for repo in ["a/b/c", "/name", "owner/"] {
            let result = GitHubClient::new(Some("token"), repo, &config);
            match result {
                Err(JanitorError::Config(msg)) => {
                    assert_eq!(msg, format!("invalid repository '{repo}', expected owner/name"));
                }
                _ => panic!("{repo} should be rejected"),
            }
        }
        assert!(GitHubClient::new(Some("token"), "octocat/hello-world", &config).is_ok());
    }
}
