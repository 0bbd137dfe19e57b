//! The newline-delimited dependency manifest (`requirements.txt`).

use std::path::{Path, PathBuf};

use janitor_core::JanitorError;
use serde::Serialize;
use tracing::{debug, info};

/// What [`DependencyManifest::add`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestChange {
    Added,
    AlreadyPresent,
}

/// A requirements-style file: one entry per line, order preserved.
///
/// # Examples
///
/// ```no_run
/// use janitor_remedy::manifest::{DependencyManifest, ManifestChange};
///
/// let manifest = DependencyManifest::new("requirements.txt");
/// assert_eq!(manifest.add("requests").unwrap(), ManifestChange::Added);
/// assert_eq!(manifest.add("requests").unwrap(), ManifestChange::AlreadyPresent);
/// ```
#[derive(Debug, Clone)]
pub struct DependencyManifest {
    path: PathBuf,
}

impl DependencyManifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All lines of the manifest; a missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Io`] if the file exists but cannot be read.
    pub fn entries(&self) -> Result<Vec<String>, JanitorError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(String::from).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "manifest does not exist yet");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether some entry already requires `package`.
    pub fn contains(&self, package: &str) -> Result<bool, JanitorError> {
        let wanted = normalize_name(package);
        Ok(self
            .entries()?
            .iter()
            .filter_map(|line| requirement_name(line))
            .any(|name| normalize_name(name) == wanted))
    }

    /// Append `package` unless it is already listed.
    ///
    /// The membership check reads the file before anything is written. On
    /// append the file is rewritten with every existing line in order and
    /// exactly one trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Config`] for an empty package name, or
    /// [`JanitorError::Io`] if the file cannot be read or written.
    pub fn add(&self, package: &str) -> Result<ManifestChange, JanitorError> {
        let package = package.trim();
        if package.is_empty() {
            return Err(JanitorError::Config("refusing to add an empty dependency".into()));
        }
        if self.contains(package)? {
            info!(package, path = %self.path.display(), "dependency already listed");
            return Ok(ManifestChange::AlreadyPresent);
        }

        let mut lines = self.entries()?;
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        lines.push(package.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{}\n", lines.join("\n")))?;
        info!(package, path = %self.path.display(), "dependency appended");
        Ok(ManifestChange::Added)
    }
}

/// Distribution name of a requirement line, or `None` for lines that do not
/// name one (blank lines, comments, pip options, bare URLs).
///
/// # Examples
///
/// ```
/// use janitor_remedy::manifest::requirement_name;
///
/// assert_eq!(requirement_name("requests[socks]>=2.31 ; python_version > '3.8'"), Some("requests"));
/// assert_eq!(requirement_name("pkg @ https://example.com/pkg.whl"), Some("pkg"));
/// assert_eq!(requirement_name("# pinned for CI"), None);
/// assert_eq!(requirement_name("-r base.txt"), None);
/// ```
pub fn requirement_name(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
        return None;
    }
    let spec = line.split(" #").next().unwrap_or(line).trim();
    if spec.split_whitespace().next().is_some_and(|t| t.contains("://")) {
        return None;
    }
    let end = spec
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(spec.len());
    let name = &spec[..end];
    (!name.is_empty()).then_some(name)
}

fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            pending_sep = true;
        } else {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with(content: Option<&str>) -> (tempfile::TempDir, DependencyManifest) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        if let Some(content) = content {
            std::fs::write(&path, content).unwrap();
        }
        (dir, DependencyManifest::new(path))
    }

    #[test]
    fn appends_with_single_trailing_newline() {
        let (_dir, manifest) = manifest_with(Some("flask==3.0\nnumpy"));
        assert_eq!(manifest.add("requests").unwrap(), ManifestChange::Added);
        let content = std::fs::read_to_string(manifest.path()).unwrap();
        assert_eq!(content, "flask==3.0\nnumpy\nrequests\n");
    }

    #[test]
    fn trailing_blank_lines_collapse() {
        let (_dir, manifest) = manifest_with(Some("flask\n\n\n"));
        manifest.add("requests").unwrap();
        let content = std::fs::read_to_string(manifest.path()).unwrap();
        assert_eq!(content, "flask\nrequests\n");
    }

    #[test]
    fn preserves_comments_and_order() {
        let (_dir, manifest) =
            manifest_with(Some("# web\nflask\n-r base.txt\n\n# data\npandas>=2\n"));
        manifest.add("requests").unwrap();
        let content = std::fs::read_to_string(manifest.path()).unwrap();
        assert_eq!(
            content,
            "# web\nflask\n-r base.txt\n\n# data\npandas>=2\nrequests\n"
        );
    }

    #[test]
    fn second_add_is_a_no_op() {
        let (_dir, manifest) = manifest_with(Some("flask\n"));
        manifest.add("requests").unwrap();
        let once = std::fs::read_to_string(manifest.path()).unwrap();
        assert_eq!(
            manifest.add("requests").unwrap(),
            ManifestChange::AlreadyPresent
        );
        let twice = std::fs::read_to_string(manifest.path()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn pinned_or_differently_spelled_entry_counts_as_present() {
        let (_dir, manifest) = manifest_with(Some("PyYAML==6.0.1\nzope.interface\n"));
        assert!(manifest.contains("pyyaml").unwrap());
        assert!(manifest.contains("zope_interface").unwrap());
        assert!(!manifest.contains("yaml").unwrap());
    }

    #[test]
    fn untouched_when_already_present_without_trailing_newline() {
        let (_dir, manifest) = manifest_with(Some("requests"));
        assert_eq!(
            manifest.add("requests").unwrap(),
            ManifestChange::AlreadyPresent
        );
        assert_eq!(std::fs::read_to_string(manifest.path()).unwrap(), "requests");
    }

    #[test]
    fn commented_out_entry_does_not_count() {
        let (_dir, manifest) = manifest_with(Some("# requests\n"));
        assert_eq!(manifest.add("requests").unwrap(), ManifestChange::Added);
    }

    #[test]
    fn missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = DependencyManifest::new(dir.path().join("ci/requirements.txt"));
        assert_eq!(manifest.add("requests").unwrap(), ManifestChange::Added);
        assert_eq!(
            std::fs::read_to_string(manifest.path()).unwrap(),
            "requests\n"
        );
    }

    #[test]
    fn empty_package_is_rejected() {
        let (_dir, manifest) = manifest_with(None);
        assert!(manifest.add("  ").is_err());
    }

    #[test]
    fn names_normalize_like_pip() {
        assert_eq!(normalize_name("Foo__Bar.baz"), "foo-bar-baz");
        assert_eq!(normalize_name("requests"), "requests");
    }
}
