//! Failure classification over raw CI log text.
//!
//! Turns a concatenated log buffer into at most one [`Finding`] by running an
//! ordered list of typed [`Matcher`]s: the first matcher that recognizes its
//! failure wins, so list order is classification priority.

pub mod log;
pub mod matchers;

use janitor_core::{ClassifyConfig, Finding};
use tracing::debug;

use crate::log::LogText;
use crate::matchers::{Matcher, MissingDependencyMatcher, RuntimeVersionConflictMatcher};

/// Ordered set of matchers plus evidence window settings.
///
/// # Examples
///
/// ```
/// use janitor_core::{ClassifyConfig, FailureKind};
/// use janitor_logscan::Classifier;
///
/// let classifier = Classifier::new(&ClassifyConfig::default());
/// let finding = classifier
///     .classify("ModuleNotFoundError: No module named 'requests'")
///     .unwrap();
/// assert_eq!(finding.kind, FailureKind::MissingDependency);
/// assert_eq!(finding.param("module"), Some("requests"));
/// ```
pub struct Classifier {
    matchers: Vec<Box<dyn Matcher>>,
    config: ClassifyConfig,
}

impl Classifier {
    /// Classifier with the built-in matchers in priority order.
    pub fn new(config: &ClassifyConfig) -> Self {
        Self::with_matchers(
            config,
            vec![
                Box::new(MissingDependencyMatcher::new()),
                Box::new(RuntimeVersionConflictMatcher::new()),
            ],
        )
    }

    pub fn with_matchers(config: &ClassifyConfig, matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self {
            matchers,
            config: config.clone(),
        }
    }

    /// Classify `log`, returning `None` when no matcher recognizes it.
    pub fn classify(&self, log: &str) -> Option<Finding> {
        let text = LogText::new(log);
        if text.is_blank() {
            debug!("empty log buffer, nothing to classify");
            return None;
        }

        self.matchers.iter().find_map(|matcher| {
            let hit = matcher.attempt(&text)?;
            debug!(kind = %matcher.kind(), line = hit.line + 1, "matcher hit");
            Some(Finding {
                kind: matcher.kind(),
                parameters: hit.parameters,
                evidence: text.evidence(hit.line, hit.source, &self.config),
            })
        })
    }
}

/// Classify `log` with the built-in matchers.
///
/// # Examples
///
/// ```
/// use janitor_core::ClassifyConfig;
///
/// assert!(janitor_logscan::classify("", &ClassifyConfig::default()).is_none());
/// ```
pub fn classify(log: &str, config: &ClassifyConfig) -> Option<Finding> {
    Classifier::new(config).classify(log)
}
