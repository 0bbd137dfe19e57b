use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::JanitorError;

/// Category of CI failure the classifier can recognize.
///
/// The declaration order is the classification priority order.
///
/// # Examples
///
/// ```
/// use janitor_core::FailureKind;
///
/// let kind: FailureKind = "missing-dependency".parse().unwrap();
/// assert_eq!(kind, FailureKind::MissingDependency);
/// assert!(kind.is_auto_fixable());
/// assert!(!FailureKind::RuntimeVersionConflict.is_auto_fixable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// An import could not be resolved at runtime.
    MissingDependency,
    /// A dependency requires a different interpreter version than CI runs.
    RuntimeVersionConflict,
}

impl FailureKind {
    /// Stable kebab-case identifier, also accepted by the approval flag.
    pub fn slug(self) -> &'static str {
        match self {
            FailureKind::MissingDependency => "missing-dependency",
            FailureKind::RuntimeVersionConflict => "runtime-version-conflict",
        }
    }

    /// Only missing dependencies are ever fixed by a commit.
    pub fn is_auto_fixable(self) -> bool {
        matches!(self, FailureKind::MissingDependency)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "missing-dependency" => Ok(FailureKind::MissingDependency),
            "runtime-version-conflict" => Ok(FailureKind::RuntimeVersionConflict),
            other => Err(format!("unknown failure kind: {other}")),
        }
    }
}

/// Ordered name/value pairs extracted by a matcher.
///
/// Serializes as a JSON object with keys in insertion order.
///
/// # Examples
///
/// ```
/// use janitor_core::Parameters;
///
/// let mut params = Parameters::default();
/// params.insert("package", "numpy");
/// params.insert("constraint", ">=3.9");
/// params.insert("package", "scipy");
/// assert_eq!(params.get("package"), Some("scipy"));
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(Vec<(String, String)>);

impl Parameters {
    /// Insert a value, replacing an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Bounded excerpt of the log around a match, kept for human review.
///
/// # Examples
///
/// ```
/// use janitor_core::Evidence;
///
/// let evidence = Evidence {
///     excerpt: "ModuleNotFoundError: No module named 'requests'".into(),
///     line: 42,
///     source: Some("app/main.py:3".into()),
///     truncated: false,
/// };
/// assert_eq!(evidence.line, 42);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Windowed log lines surrounding the match.
    pub excerpt: String,
    /// 1-based line number of the matched line in the concatenated log.
    pub line: usize,
    /// `path:line` of the importing source file, when the log names it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Whether the excerpt hit the character cap.
    pub truncated: bool,
}

/// Structured result of classifying a CI log buffer.
///
/// # Examples
///
/// ```
/// use janitor_core::{Evidence, FailureKind, Finding, Parameters};
///
/// let mut parameters = Parameters::default();
/// parameters.insert("module", "requests");
/// let finding = Finding {
///     kind: FailureKind::MissingDependency,
///     parameters,
///     evidence: Evidence {
///         excerpt: String::new(),
///         line: 1,
///         source: None,
///         truncated: false,
///     },
/// };
/// assert_eq!(finding.param("module"), Some("requests"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub kind: FailureKind,
    pub parameters: Parameters,
    pub evidence: Evidence,
}

impl Finding {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key)
    }
}

/// Whether remediation may proceed during this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
    Unapproved,
    Approved,
}

/// Out-of-band approval supplied to the current invocation.
///
/// # Examples
///
/// ```
/// use janitor_core::{ApprovalSignal, FailureKind};
///
/// assert_eq!(ApprovalSignal::parse(None).unwrap(), ApprovalSignal::Absent);
/// assert_eq!(ApprovalSignal::parse(Some("1")).unwrap(), ApprovalSignal::AllKinds);
/// assert_eq!(
///     ApprovalSignal::parse(Some("missing-dependency")).unwrap(),
///     ApprovalSignal::Kind(FailureKind::MissingDependency)
/// );
/// assert!(ApprovalSignal::parse(Some("maybe")).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalSignal {
    #[default]
    Absent,
    /// Coarse approval for whatever is found.
    AllKinds,
    /// Approval naming a single failure kind.
    Kind(FailureKind),
}

impl ApprovalSignal {
    /// Parse the raw approval flag value.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Config`] for values that are neither boolean-like
    /// nor a failure kind slug.
    pub fn parse(raw: Option<&str>) -> Result<Self, JanitorError> {
        let Some(raw) = raw else {
            return Ok(ApprovalSignal::Absent);
        };
        match raw.trim().to_lowercase().as_str() {
            "" | "0" | "false" | "no" => Ok(ApprovalSignal::Absent),
            "1" | "true" | "yes" | "all" => Ok(ApprovalSignal::AllKinds),
            other => other
                .parse::<FailureKind>()
                .map(ApprovalSignal::Kind)
                .map_err(|_| {
                    JanitorError::Config(format!(
                        "invalid approval flag '{raw}': expected 1, 0, all, or a failure kind"
                    ))
                }),
        }
    }
}

/// Output format for command results.
///
/// # Examples
///
/// ```
/// use janitor_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
