use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::JanitorError;
use crate::types::{ApprovalSignal, FailureKind};

/// Top-level configuration loaded from `.ci-janitor.toml`.
///
/// Built once at process start and passed by reference into every
/// component. Invocation-specific inputs live in [`RunContext`].
///
/// # Examples
///
/// ```
/// use janitor_core::JanitorConfig;
///
/// let config = JanitorConfig::default();
/// assert_eq!(config.manifest.path.to_str(), Some("requirements.txt"));
/// assert_eq!(config.network.retries, 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JanitorConfig {
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub manifest: ManifestConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl JanitorConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Io`] if the file cannot be read, or
    /// [`JanitorError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, JanitorError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use janitor_core::{FlagScope, JanitorConfig};
    ///
    /// let toml = r#"
    /// [approval]
    /// flag_scope = "detected-kind"
    /// "#;
    /// let config = JanitorConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.approval.flag_scope, FlagScope::DetectedKind);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, JanitorError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Which failure kinds the out-of-band approval flag covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlagScope {
    /// A coarse flag approves whatever kind is currently found.
    #[default]
    AnyKind,
    /// Only a flag naming the detected kind approves it.
    DetectedKind,
}

/// Approval command configuration.
///
/// # Examples
///
/// ```
/// use janitor_core::{ApprovalConfig, FailureKind};
///
/// let config = ApprovalConfig::default();
/// assert_eq!(config.token_for(FailureKind::MissingDependency), "/ci-janitor approve");
/// assert_eq!(
///     config.token_for(FailureKind::RuntimeVersionConflict),
///     "/ci-janitor acknowledge-runtime"
/// );
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Leading word of every approval command (default: `/ci-janitor`).
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default)]
    pub flag_scope: FlagScope,
}

impl ApprovalConfig {
    /// The exact phrase a human must comment to approve `kind`.
    pub fn token_for(&self, kind: FailureKind) -> String {
        let verb = match kind {
            FailureKind::MissingDependency => "approve",
            FailureKind::RuntimeVersionConflict => "acknowledge-runtime",
        };
        format!("{} {verb}", self.command_prefix.trim())
    }
}

fn default_command_prefix() -> String {
    "/ci-janitor".into()
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            flag_scope: FlagScope::default(),
        }
    }
}

/// Evidence window settings for the log classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Lines kept before the matched line (default: 3).
    #[serde(default = "default_context_lines")]
    pub context_before: usize,
    /// Lines kept after the matched line (default: 3).
    #[serde(default = "default_context_lines")]
    pub context_after: usize,
    /// Hard cap on excerpt size in characters (default: 2000).
    #[serde(default = "default_max_evidence_chars")]
    pub max_evidence_chars: usize,
}

fn default_context_lines() -> usize {
    3
}

fn default_max_evidence_chars() -> usize {
    2000
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            context_before: default_context_lines(),
            context_after: default_context_lines(),
            max_evidence_chars: default_max_evidence_chars(),
        }
    }
}

/// Location of the dependency manifest, relative to the workspace root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    #[serde(default = "default_manifest_path")]
    pub path: PathBuf,
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("requirements.txt")
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: default_manifest_path(),
        }
    }
}

/// Commit identity and push target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    #[serde(default = "default_bot_email")]
    pub bot_email: String,
    #[serde(default = "default_remote")]
    pub remote: String,
}

fn default_bot_name() -> String {
    "ci-janitor-bot".into()
}

fn default_bot_email() -> String {
    "ci-janitor@users.noreply.github.com".into()
}

fn default_remote() -> String {
    "origin".into()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            bot_email: default_bot_email(),
            remote: default_remote(),
        }
    }
}

/// GitHub API endpoint and the bot account whose comments are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Login the janitor posts as; its own comments never count as approval.
    #[serde(default = "default_bot_login")]
    pub bot_login: String,
}

fn default_api_url() -> String {
    "https://api.github.com".into()
}

fn default_bot_login() -> String {
    "github-actions[bot]".into()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            bot_login: default_bot_login(),
        }
    }
}

/// Timeout and retry policy applied to every network call.
///
/// # Examples
///
/// ```
/// use janitor_core::NetworkConfig;
///
/// let config = NetworkConfig { timeout_secs: 10, retries: 5 };
/// assert_eq!(config.max_attempts(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after a transient failure; values above 1 are clamped.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn max_attempts(&self) -> u32 {
        1 + self.retries.min(1)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    1
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

/// Inputs that identify what a single invocation acts on.
///
/// # Examples
///
/// ```
/// use janitor_core::{ApprovalSignal, RunContext};
///
/// let ctx = RunContext {
///     repo: "octocat/hello-world".into(),
///     run_id: Some(42),
///     pr_number: None,
///     branch: None,
///     approval: ApprovalSignal::Absent,
///     runtime_label: "3.11".into(),
/// };
/// assert_eq!(ctx.repo_parts().unwrap(), ("octocat", "hello-world"));
/// ```
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Repository as `owner/name`.
    pub repo: String,
    pub run_id: Option<u64>,
    pub pr_number: Option<u64>,
    /// Source branch of the pull request; required to push a fix.
    pub branch: Option<String>,
    pub approval: ApprovalSignal,
    /// Interpreter version label, used only in message text.
    pub runtime_label: String,
}

impl RunContext {
    /// Split the repository identifier into owner and name.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Config`] unless the identifier is `owner/name`.
    pub fn repo_parts(&self) -> Result<(&str, &str), JanitorError> {
        split_repo(&self.repo)
    }
}

/// Split an `owner/name` repository identifier.
///
/// # Errors
///
/// Returns [`JanitorError::Config`] unless both parts are non-empty and the
/// name contains no further `/`.
///
/// # Examples
///
/// ```
/// use janitor_core::split_repo;
///
/// assert_eq!(split_repo("octocat/hello-world").unwrap(), ("octocat", "hello-world"));
/// assert!(split_repo("octocat").is_err());
/// ```
pub fn split_repo(repo: &str) -> Result<(&str, &str), JanitorError> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(JanitorError::Config(format!(
            "invalid repository '{repo}', expected owner/name"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = JanitorConfig::default();
        assert_eq!(config.approval.command_prefix, "/ci-janitor");
        assert_eq!(config.approval.flag_scope, FlagScope::AnyKind);
        assert_eq!(config.classify.context_before, 3);
        assert_eq!(config.classify.context_after, 3);
        assert_eq!(config.classify.max_evidence_chars, 2000);
        assert_eq!(config.git.bot_name, "ci-janitor-bot");
        assert_eq!(config.git.bot_email, "ci-janitor@users.noreply.github.com");
        assert_eq!(config.git.remote, "origin");
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(config.network.max_attempts(), 2);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = JanitorConfig::from_toml("").unwrap();
        assert_eq!(config.manifest.path, PathBuf::from("requirements.txt"));
        assert_eq!(config.approval.command_prefix, "/ci-janitor");
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[approval]
command_prefix = "/janitor"
flag_scope = "detected-kind"

[classify]
context_before = 5
max_evidence_chars = 500

[manifest]
path = "deps/requirements-ci.txt"

[git]
bot_name = "fixer"
remote = "upstream"

[network]
timeout_secs = 5
retries = 0
"#;
        let config = JanitorConfig::from_toml(toml).unwrap();
        assert_eq!(
            config.approval.token_for(FailureKind::MissingDependency),
            "/janitor approve"
        );
        assert_eq!(config.approval.flag_scope, FlagScope::DetectedKind);
        assert_eq!(config.classify.context_before, 5);
        assert_eq!(config.classify.context_after, 3);
        assert_eq!(config.classify.max_evidence_chars, 500);
        assert_eq!(config.manifest.path, PathBuf::from("deps/requirements-ci.txt"));
        assert_eq!(config.git.bot_name, "fixer");
        assert_eq!(config.git.bot_email, "ci-janitor@users.noreply.github.com");
        assert_eq!(config.git.remote, "upstream");
        assert_eq!(config.network.max_attempts(), 1);
    }

    #[test]
    fn invalid_flag_scope_is_rejected() {
        let result = JanitorConfig::from_toml("[approval]\nflag_scope = \"sometimes\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn repo_parts_rejects_malformed_identifiers() {
        let mut ctx = RunContext {
            repo: "owner-only".into(),
            run_id: None,
            pr_number: None,
            branch: None,
            approval: ApprovalSignal::Absent,
            runtime_label: "unknown".into(),
        };
        assert!(ctx.repo_parts().is_err());
        ctx.repo = "a/b/c".into();
        assert!(ctx.repo_parts().is_err());
        ctx.repo = "/name".into();
        assert!(ctx.repo_parts().is_err());
    }

    #[test]
    fn split_repo_reports_the_bad_identifier() {
        assert_eq!(split_repo("octocat/hello-world").unwrap(), ("octocat", "hello-world"));
        match split_repo("octocat/") {
            Err(JanitorError::Config(msg)) => assert!(msg.contains("'octocat/'")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
