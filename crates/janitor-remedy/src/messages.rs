//! Pull request comment bodies.

use std::fmt::Write;

use janitor_core::Evidence;
use janitor_logscan::matchers::UNKNOWN_PACKAGE;

use crate::manifest::ManifestChange;
use crate::request::{manifest_entry, RemediationRequest};

const HEADER: &str = "\u{1f916} **CI Janitor**";

fn evidence_block(out: &mut String, evidence: &Evidence) {
    if let Some(source) = &evidence.source {
        let _ = writeln!(out, "Raised while importing from `{source}`.\n");
    }
    let _ = writeln!(out, "<details><summary>Log excerpt (line {})</summary>\n", evidence.line);
    let fence = if evidence.excerpt.contains("```") { "~~~~" } else { "```" };
    let _ = writeln!(out, "{fence}\n{}\n{fence}\n</details>\n", evidence.excerpt);
}

/// Diagnosis and approval request for a missing dependency.
pub fn missing_dependency_diagnosis(request: &RemediationRequest) -> String {
    let finding = &request.finding;
    let module = finding.param("module").unwrap_or_else(|| manifest_entry(finding));
    let mut out = format!("{HEADER}\n\n**Error**\n\u{2022} Missing Python dependency `{module}`\n\n");
    evidence_block(&mut out, &finding.evidence);
    let _ = writeln!(out, "**Proposed fix**\n\u{2022} {}\n", request.proposal);
    let entry = manifest_entry(finding);
    if module.contains('.') && module != entry {
        let _ = writeln!(
            out,
            "\u{2139}\u{fe0f} `{module}` is a submodule. Check that `{entry}` is the name the package is published under before approving.\n"
        );
    }
    let _ = writeln!(
        out,
        "Reply with `{}` to apply.",
        request.approval_token
    );
    out
}

/// Confirmation after the fix was applied (or found already applied).
pub fn fix_applied(
    package: &str,
    manifest: &str,
    change: ManifestChange,
    commit: Option<&str>,
) -> String {
    match (change, commit) {
        (ManifestChange::Added, Some(id)) => format!(
            "\u{2705} Added `{package}` to `{manifest}` in {}.",
            short_id(id)
        ),
        (_, Some(id)) => format!(
            "\u{2705} `{package}` was already listed in `{manifest}`; pushed the pending change {}.",
            short_id(id)
        ),
        (ManifestChange::Added, None) => format!("\u{2705} Added `{package}` to `{manifest}`."),
        (ManifestChange::AlreadyPresent, None) => format!(
            "\u{2705} `{package}` is already in `{manifest}`; nothing new to commit."
        ),
    }
}

fn conflict_summary(request: &RemediationRequest, runtime_label: &str) -> String {
    let finding = &request.finding;
    let constraint = finding.param("constraint").unwrap_or("?");
    let running = finding.param("running").unwrap_or(runtime_label);
    let subject = match finding.param("package") {
        Some(pkg) if pkg != UNKNOWN_PACKAGE => format!("`{pkg}`"),
        _ => "A dependency".to_string(),
    };
    format!("{subject} requires Python `{constraint}`  \nCI is running Python `{running}`\n")
}

/// Diagnosis of a runtime version conflict with manual guidance.
pub fn runtime_conflict_diagnosis(request: &RemediationRequest, runtime_label: &str) -> String {
    let mut out = format!("{HEADER} \u{2014} Python Version Conflict\n\n");
    out.push_str(&conflict_summary(request, runtime_label));
    out.push('\n');
    evidence_block(&mut out, &request.finding.evidence);
    let _ = writeln!(out, "**Suggested manual fix**\n\u{2022} {}\n", request.proposal);
    let _ = writeln!(out, "\u{26a0}\u{fe0f} No automatic fix is available for this failure.");
    let _ = writeln!(
        out,
        "Reply with `{}` to confirm you will handle it.",
        request.approval_token
    );
    out
}

/// Acknowledgement once a runtime conflict was approved; no change is made.
pub fn runtime_conflict_guidance(request: &RemediationRequest, runtime_label: &str) -> String {
    let mut out = format!("{HEADER} \u{2014} Python Version Conflict acknowledged\n\n");
    out.push_str(&conflict_summary(request, runtime_label));
    let _ = writeln!(out, "\nNext step: {}.", request.proposal);
    let _ = writeln!(
        out,
        "\u{26a0}\u{fe0f} No automatic fix applied; this change has to be made by hand."
    );
    out
}

pub fn no_known_fix() -> String {
    format!("{HEADER}: CI failed, but no supported fix was detected.")
}

fn short_id(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}
