//! Workflow log archives.

use std::io::{Cursor, Read};

use janitor_core::JanitorError;
use tracing::debug;

/// Concatenate every file in a zipped log archive, in archive order.
///
/// Directory entries are skipped and no separator is inserted between
/// files. Invalid UTF-8 is replaced rather than rejected.
///
/// # Errors
///
/// Returns [`JanitorError::Archive`] if `bytes` is not a readable zip.
///
/// # Examples
///
/// ```
/// use std::io::Write;
/// use janitor_github::archive::concat_log_archive;
///
/// let mut buf = std::io::Cursor::new(Vec::new());
/// let mut zip = zip::ZipWriter::new(&mut buf);
/// let opts = zip::write::SimpleFileOptions::default();
/// zip.start_file("1_build.txt", opts).unwrap();
/// zip.write_all(b"step one\n").unwrap();
/// zip.finish().unwrap();
///
/// assert_eq!(concat_log_archive(buf.get_ref()).unwrap(), "step one\n");
/// ```
pub fn concat_log_archive(bytes: &[u8]) -> Result<String, JanitorError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| JanitorError::Archive(format!("invalid log archive: {e}")))?;

    let mut text = String::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| JanitorError::Archive(format!("unreadable archive entry {i}: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let mut raw = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry
            .read_to_end(&mut raw)
            .map_err(|e| JanitorError::Archive(format!("failed to read {}: {e}", entry.name())))?;
        debug!(name = entry.name(), bytes = raw.len(), "log file");
        text.push_str(&String::from_utf8_lossy(&raw));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let opts = zip::write::SimpleFileOptions::default();
            for (name, content) in entries {
                if name.ends_with('/') {
                    zip.add_directory(*name, opts).unwrap();
                } else {
                    zip.start_file(*name, opts).unwrap();
                    zip.write_all(content).unwrap();
                }
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn concatenates_in_archive_order_without_separators() {
        let bytes = archive(&[
            ("2_test.txt", b"collected 3 items"),
            ("1_setup.txt", b"pip install\n"),
        ]);
        assert_eq!(
            concat_log_archive(&bytes).unwrap(),
            "collected 3 itemspip install\n"
        );
    }

    #[test]
    fn skips_directories() {
        let bytes = archive(&[("build/", b""), ("build/3_run.txt", b"No module named 'x'\n")]);
        assert_eq!(concat_log_archive(&bytes).unwrap(), "No module named 'x'\n");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let bytes = archive(&[("log.txt", b"ok \xff done")]);
        assert_eq!(concat_log_archive(&bytes).unwrap(), "ok \u{fffd} done");
    }

    #[test]
    fn rejects_non_zip() {
        let result = concat_log_archive(b"<html>not found</html>");
        assert!(matches!(result, Err(JanitorError::Archive(_))));
    }
}
