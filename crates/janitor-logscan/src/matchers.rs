//! Typed matchers, one per failure kind.

use janitor_core::{FailureKind, Parameters};
use regex::Regex;

use crate::log::LogText;

/// Package name used when a version conflict does not name its package.
pub const UNKNOWN_PACKAGE: &str = "unknown-package";

/// How far above an import error to look for the importing frame.
const SOURCE_LOOKBACK: usize = 3;

/// Outcome of a successful [`Matcher::attempt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// 0-based line index of the matched error line.
    pub line: usize,
    pub parameters: Parameters,
    /// `path:line` of the importing source file, when present in the log.
    pub source: Option<String>,
}

/// A single "attempt classification" capability.
///
/// Implementations anchor on stable error vocabulary, never on line position.
pub trait Matcher: Send + Sync {
    fn kind(&self) -> FailureKind;

    /// Look for this matcher's failure in `log`, returning the first hit.
    fn attempt(&self, log: &LogText) -> Option<Match>;
}

/// Recognizes `No module named '<name>'`.
///
/// # Examples
///
/// ```
/// use janitor_logscan::log::LogText;
/// use janitor_logscan::matchers::{Matcher, MissingDependencyMatcher};
///
/// let log = LogText::new("E   ModuleNotFoundError: No module named 'yaml'");
/// let hit = MissingDependencyMatcher::new().attempt(&log).unwrap();
/// assert_eq!(hit.parameters.get("module"), Some("yaml"));
/// ```
pub struct MissingDependencyMatcher {
    error: Regex,
    frames: Vec<Regex>,
}

impl MissingDependencyMatcher {
    pub fn new() -> Self {
        Self {
            error: Regex::new(r#"No module named ['"]([^'"]+)['"]"#).expect("static pattern"),
            frames: vec![
                // Python traceback frame
                Regex::new(r#"^\s*File "([^"]+)", line (\d+)"#).expect("static pattern"),
                // pytest collection error
                Regex::new(r"^\s*(\S+\.py):(\d+): in ").expect("static pattern"),
            ],
        }
    }

    fn source_above(&self, log: &LogText, index: usize) -> Option<String> {
        let lines = log.lines();
        let start = index.saturating_sub(SOURCE_LOOKBACK);
        lines[start..index].iter().rev().find_map(|line| {
            self.frames.iter().find_map(|re| {
                re.captures(line)
                    .map(|caps| format!("{}:{}", &caps[1], &caps[2]))
            })
        })
    }
}

impl Default for MissingDependencyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher for MissingDependencyMatcher {
    fn kind(&self) -> FailureKind {
        FailureKind::MissingDependency
    }

    fn attempt(&self, log: &LogText) -> Option<Match> {
        let hit = log.find(&self.error)?;
        let module = hit.captures[1].trim();
        if module.is_empty() {
            return None;
        }
        let package = module.split('.').next().unwrap_or(module);

        let mut parameters = Parameters::default();
        parameters.insert("module", module);
        parameters.insert("package", package);

        Some(Match {
            line: hit.index,
            parameters,
            source: self.source_above(log, hit.index),
        })
    }
}

/// Which capture group holds which parameter for one conflict pattern.
struct ConflictPattern {
    re: Regex,
    package: Option<usize>,
    constraint: usize,
    running: Option<usize>,
    /// Pull the package out of a distribution file name instead of a group.
    package_from_url: bool,
}

/// Recognizes a dependency requiring a different interpreter version.
///
/// Patterns are tried in priority order; the first pattern that matches
/// anywhere wins, and within it the earliest line.
///
/// # Examples
///
/// ```
/// use janitor_logscan::log::LogText;
/// use janitor_logscan::matchers::{Matcher, RuntimeVersionConflictMatcher, UNKNOWN_PACKAGE};
///
/// let log = LogText::new("0.9 Requires-Python >=3.8,<3.10");
/// let hit = RuntimeVersionConflictMatcher::new().attempt(&log).unwrap();
/// assert_eq!(hit.parameters.get("constraint"), Some(">=3.8,<3.10"));
/// assert_eq!(hit.parameters.get("package"), Some(UNKNOWN_PACKAGE));
/// ```
pub struct RuntimeVersionConflictMatcher {
    patterns: Vec<ConflictPattern>,
    dist_name: Regex,
}

const CONSTRAINT: &str = r"([<>=!~^][0-9A-Za-z.*<>=!~^,]*)";

/// Words that precede "requires Python" without naming a package.
const NOT_A_PACKAGE: &[&str] = &["project", "package", "this", "it", "which", "that"];

impl RuntimeVersionConflictMatcher {
    pub fn new() -> Self {
        let pattern = |src: &str| Regex::new(src).expect("static pattern");
        Self {
            patterns: vec![
                ConflictPattern {
                    re: pattern(
                        r#"Package ['"]([^'"]+)['"] requires a different Python: (\S+) not in ['"]([^'"]+)['"]"#,
                    ),
                    package: Some(1),
                    constraint: 3,
                    running: Some(2),
                    package_from_url: false,
                },
                ConflictPattern {
                    re: pattern(
                        r#"Link requires a different Python \((\S+) not in: ['"]([^'"]+)['"]\)"#,
                    ),
                    package: None,
                    constraint: 2,
                    running: Some(1),
                    package_from_url: true,
                },
                ConflictPattern {
                    re: pattern(&format!(
                        r"([A-Za-z0-9][A-Za-z0-9._\-]*) requires Python\s*{CONSTRAINT}"
                    )),
                    package: Some(1),
                    constraint: 2,
                    running: None,
                    package_from_url: false,
                },
                ConflictPattern {
                    re: pattern(&format!(r"Requires-Python\s*:?\s*{CONSTRAINT}")),
                    package: None,
                    constraint: 1,
                    running: None,
                    package_from_url: false,
                },
                ConflictPattern {
                    re: pattern(r"(?i)requires python\s*(\S[^\n]*)"),
                    package: None,
                    constraint: 1,
                    running: None,
                    package_from_url: false,
                },
            ],
            dist_name: pattern(r"/([A-Za-z0-9][A-Za-z0-9_.]*?)-\d[^/\s]*\.(?:tar\.gz|whl|zip)"),
        }
    }
}

impl Default for RuntimeVersionConflictMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher for RuntimeVersionConflictMatcher {
    fn kind(&self) -> FailureKind {
        FailureKind::RuntimeVersionConflict
    }

    fn attempt(&self, log: &LogText) -> Option<Match> {
        self.patterns.iter().find_map(|p| {
            let hit = log.find(&p.re)?;
            let constraint = hit
                .captures
                .get(p.constraint)
                .map(|m| m.as_str().trim().trim_end_matches(','))
                .filter(|c| !c.is_empty())?;

            let package = if p.package_from_url {
                self.dist_name
                    .captures(&log.lines()[hit.index])
                    .map(|caps| caps[1].to_string())
            } else {
                p.package
                    .and_then(|g| hit.captures.get(g))
                    .map(|m| m.as_str().to_string())
                    .filter(|name| !NOT_A_PACKAGE.contains(&name.to_lowercase().as_str()))
            };

            let mut parameters = Parameters::default();
            parameters.insert("package", package.as_deref().unwrap_or(UNKNOWN_PACKAGE));
            parameters.insert("constraint", constraint);
            if let Some(running) = p.running.and_then(|g| hit.captures.get(g)) {
                parameters.insert("running", running.as_str());
            }

            Some(Match {
                line: hit.index,
                parameters,
                source: None,
            })
        })
    }
}
