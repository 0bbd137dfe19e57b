//! Approval gate: decides whether remediation may proceed this run.

use janitor_core::{ApprovalConfig, ApprovalSignal, ApprovalState, FailureKind, Finding, FlagScope};
use tracing::{debug, warn};

/// Derives [`ApprovalState`] from the approval flag and PR comment bodies.
///
/// Nothing is persisted; every invocation decides from scratch.
///
/// # Examples
///
/// ```
/// use janitor_core::{ApprovalConfig, ApprovalSignal, ApprovalState, ClassifyConfig};
/// use janitor_remedy::gate::ApprovalGate;
///
/// let finding = janitor_logscan::classify("No module named 'x'", &ClassifyConfig::default()).unwrap();
/// let gate = ApprovalGate::new(&ApprovalConfig::default());
///
/// let comments = ["looks right to me\n/ci-janitor approve"];
/// assert_eq!(gate.decide(&finding, ApprovalSignal::Absent, &comments), ApprovalState::Approved);
/// assert_eq!(gate.decide(&finding, ApprovalSignal::Absent, &[] as &[&str]), ApprovalState::Unapproved);
/// ```
pub struct ApprovalGate {
    config: ApprovalConfig,
}

impl ApprovalGate {
    pub fn new(config: &ApprovalConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Whether the out-of-band signal alone approves `kind`.
    pub fn signal_approves(&self, kind: FailureKind, signal: ApprovalSignal) -> bool {
        match (signal, self.config.flag_scope) {
            (ApprovalSignal::Absent, _) => false,
            (ApprovalSignal::Kind(k), _) => k == kind,
            (ApprovalSignal::AllKinds, FlagScope::AnyKind) => true,
            (ApprovalSignal::AllKinds, FlagScope::DetectedKind) => {
                warn!(
                    kind = %kind,
                    "approval flag does not name a failure kind and flag_scope is detected-kind; ignoring it"
                );
                false
            }
        }
    }

    pub fn decide<S: AsRef<str>>(
        &self,
        finding: &Finding,
        signal: ApprovalSignal,
        comments: &[S],
    ) -> ApprovalState {
        if self.signal_approves(finding.kind, signal) {
            debug!(kind = %finding.kind, "approved by flag");
            return ApprovalState::Approved;
        }

        self.decide_from_comments(finding.kind, comments)
    }

    /// Comment half of [`ApprovalGate::decide`], for callers that already
    /// checked the signal with [`ApprovalGate::signal_approves`].
    pub fn decide_from_comments<S: AsRef<str>>(
        &self,
        kind: FailureKind,
        comments: &[S],
    ) -> ApprovalState {
        let token = self.config.token_for(kind);
        if comments.iter().any(|c| comment_approves(c.as_ref(), &token)) {
            debug!(kind = %kind, token = %token, "approved by comment");
            ApprovalState::Approved
        } else {
            ApprovalState::Unapproved
        }
    }
}

/// True when some line of `body` is exactly `token`, ignoring case and spacing.
///
/// # Examples
///
/// ```
/// use janitor_remedy::gate::comment_approves;
///
/// assert!(comment_approves("  /CI-Janitor   Approve ", "/ci-janitor approve"));
/// assert!(!comment_approves("/ci-janitor approved", "/ci-janitor approve"));
/// assert!(!comment_approves("please /ci-janitor approve", "/ci-janitor approve"));
/// ```
pub fn comment_approves(body: &str, token: &str) -> bool {
    let token = normalize(token);
    if token.is_empty() {
        return false;
    }
    body.lines().any(|line| normalize(line) == token)
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use janitor_core::ClassifyConfig;

    fn missing_dep() -> Finding {
        janitor_logscan::classify("No module named 'requests'", &ClassifyConfig::default())
            .unwrap()
    }

    fn runtime_conflict() -> Finding {
        janitor_logscan::classify("Requires-Python >=3.8,<3.10", &ClassifyConfig::default())
            .unwrap()
    }

    fn gate(scope: FlagScope) -> ApprovalGate {
        ApprovalGate::new(&ApprovalConfig {
            flag_scope: scope,
            ..ApprovalConfig::default()
        })
    }

    const NONE: &[&str] = &[];

    #[test]
    fn coarse_flag_approves_any_kind_by_default() {
        let gate = gate(FlagScope::AnyKind);
        for finding in [missing_dep(), runtime_conflict()] {
            assert_eq!(
                gate.decide(&finding, ApprovalSignal::AllKinds, NONE),
                ApprovalState::Approved
            );
        }
    }

    #[test]
    fn coarse_flag_ignored_when_scoped_to_detected_kind() {
        let gate = gate(FlagScope::DetectedKind);
        assert_eq!(
            gate.decide(&missing_dep(), ApprovalSignal::AllKinds, NONE),
            ApprovalState::Unapproved
        );
        assert_eq!(
            gate.decide(
                &missing_dep(),
                ApprovalSignal::Kind(FailureKind::MissingDependency),
                NONE
            ),
            ApprovalState::Approved
        );
    }

    #[test]
    fn kind_flag_only_covers_its_kind() {
        let gate = gate(FlagScope::AnyKind);
        assert_eq!(
            gate.decide(
                &runtime_conflict(),
                ApprovalSignal::Kind(FailureKind::MissingDependency),
                NONE
            ),
            ApprovalState::Unapproved
        );
    }

    #[test]
    fn comment_order_is_irrelevant() {
        let gate = gate(FlagScope::AnyKind);
        let a = ["noise", "/ci-janitor approve", "more noise"];
        let b = ["/ci-janitor approve", "more noise", "noise"];
        assert_eq!(
            gate.decide(&missing_dep(), ApprovalSignal::Absent, &a),
            gate.decide(&missing_dep(), ApprovalSignal::Absent, &b)
        );
    }

    #[test]
    fn token_is_bound_to_kind() {
        let gate = gate(FlagScope::AnyKind);
        let comments = ["/ci-janitor approve"];
        assert_eq!(
            gate.decide(&runtime_conflict(), ApprovalSignal::Absent, &comments),
            ApprovalState::Unapproved
        );
        let comments = ["/ci-janitor acknowledge-runtime"];
        assert_eq!(
            gate.decide(&runtime_conflict(), ApprovalSignal::Absent, &comments),
            ApprovalState::Approved
        );
        assert_eq!(
            gate.decide(&missing_dep(), ApprovalSignal::Absent, &comments),
            ApprovalState::Unapproved
        );
    }

    #[test]
    fn comment_decision_ignores_the_flag() {
        let gate = gate(FlagScope::DetectedKind);
        assert_eq!(
            gate.decide_from_comments(FailureKind::MissingDependency, NONE),
            ApprovalState::Unapproved
        );
        assert_eq!(
            gate.decide_from_comments(FailureKind::MissingDependency, &["/ci-janitor approve"]),
            ApprovalState::Approved
        );
    }

    #[test]
    fn substring_inside_longer_word_does_not_approve() {
        assert!(!comment_approves("/ci-janitor approves", "/ci-janitor approve"));
        assert!(!comment_approves("x/ci-janitor approve", "/ci-janitor approve"));
        assert!(!comment_approves(
            "Reply with `/ci-janitor approve` to apply.",
            "/ci-janitor approve"
        ));
    }

    #[test]
    fn crlf_and_tabs_are_normalized() {
        assert!(comment_approves("thanks!\r\n\t/ci-janitor\tapprove\r\n", "/ci-janitor approve"));
    }

    #[test]
    fn empty_token_never_matches() {
        assert!(!comment_approves("", ""));
        assert!(!comment_approves("   ", " "));
    }
}
