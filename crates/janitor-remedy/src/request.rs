use std::path::Path;

use janitor_core::{FailureKind, Finding, JanitorConfig};
use janitor_logscan::matchers::UNKNOWN_PACKAGE;

/// A finding paired with its proposed change and the approval command for it.
///
/// # Examples
///
/// ```
/// use janitor_core::{ClassifyConfig, JanitorConfig};
/// use janitor_remedy::request::RemediationRequest;
///
/// let finding = janitor_logscan::classify(
///     "No module named 'requests'",
///     &ClassifyConfig::default(),
/// )
/// .unwrap();
/// let request = RemediationRequest::new(finding, &JanitorConfig::default());
/// assert_eq!(request.approval_token, "/ci-janitor approve");
/// assert_eq!(request.proposal, "Add `requests` to `requirements.txt`");
/// ```
#[derive(Debug, Clone)]
pub struct RemediationRequest {
    pub finding: Finding,
    /// Human-readable description of the proposed mutation.
    pub proposal: String,
    /// Exact phrase a reviewer comments to approve.
    pub approval_token: String,
}

impl RemediationRequest {
    pub fn new(finding: Finding, config: &JanitorConfig) -> Self {
        let proposal = match finding.kind {
            FailureKind::MissingDependency => format!(
                "Add `{}` to `{}`",
                manifest_entry(&finding),
                display_path(&config.manifest.path)
            ),
            FailureKind::RuntimeVersionConflict => {
                let constraint = finding.param("constraint").unwrap_or("?");
                match finding.param("package") {
                    Some(pkg) if pkg != UNKNOWN_PACKAGE => format!(
                        "Run CI on a Python version matching `{constraint}`, or pin `{pkg}` to a release that supports the current interpreter"
                    ),
                    _ => format!("Run CI on a Python version matching `{constraint}`"),
                }
            }
        };
        let approval_token = config.approval.token_for(finding.kind);
        Self {
            finding,
            proposal,
            approval_token,
        }
    }
}

/// The manifest line a missing-dependency fix appends.
pub fn manifest_entry(finding: &Finding) -> &str {
    finding
        .param("package")
        .or_else(|| finding.param("module"))
        .unwrap_or(UNKNOWN_PACKAGE)
}

pub(crate) fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
