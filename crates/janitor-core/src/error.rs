/// Errors that can occur anywhere in the janitor pipeline.
///
/// Resolution failures are fatal and never produce a PR comment. Network
/// failures are the only variant the retry policy treats as transient.
///
/// # Examples
///
/// ```
/// use janitor_core::JanitorError;
///
/// let err = JanitorError::Resolution("no failed run for PR #7".into());
/// assert!(err.to_string().contains("PR #7"));
/// assert!(!err.is_transient());
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum JanitorError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(janitor::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(janitor::config))]
    Config(String),

    /// Could not determine which run, pull request, or branch to act on.
    #[error("could not resolve target: {0}")]
    #[diagnostic(
        code(janitor::resolution),
        help("pass --pr/PR_NUMBER, --run-id/RUN_ID and --branch/PR_BRANCH explicitly")
    )]
    Resolution(String),

    /// Transport-level failure or timeout; eligible for one retry.
    #[error("network error: {0}")]
    #[diagnostic(code(janitor::network))]
    Network(String),

    /// The GitHub API rejected a request.
    #[error("GitHub API error: {0}")]
    #[diagnostic(code(janitor::github))]
    GitHub(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    #[diagnostic(code(janitor::git))]
    Git(String),

    /// The downloaded log archive could not be read.
    #[error("log archive error: {0}")]
    #[diagnostic(code(janitor::archive))]
    Archive(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(janitor::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(janitor::toml))]
    Toml(#[from] toml::de::Error),
}

impl JanitorError {
    /// Whether the retry policy may attempt the failed call again.
    pub fn is_transient(&self) -> bool {
        matches!(self, JanitorError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: JanitorError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = JanitorError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn only_network_errors_are_transient() {
        assert!(JanitorError::Network("reset by peer".into()).is_transient());
        assert!(!JanitorError::GitHub("404 Not Found".into()).is_transient());
        assert!(!JanitorError::Resolution("no PR".into()).is_transient());
    }
}
