//! Normalized view over a concatenated CI log buffer.

use std::sync::OnceLock;

use janitor_core::{ClassifyConfig, Evidence};
use regex::{Captures, Regex};

const TRUNCATION_MARKER: &str = "… [truncated]";

fn ansi_escape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("static pattern"))
}

fn runner_timestamp() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z ?").expect("static pattern")
    })
}

/// Log text split into cleaned lines.
///
/// Cleaning strips ANSI colour escapes, carriage returns, and the timestamp
/// prefix GitHub Actions runners put on every line. Nothing else about the
/// buffer is assumed: log files may be glued together without separators.
///
/// # Examples
///
/// ```
/// use janitor_logscan::log::LogText;
///
/// let log = LogText::new("2024-05-01T10:00:00.1234567Z \x1b[31mboom\x1b[0m\r\nok");
/// assert_eq!(log.lines(), ["boom", "ok"]);
/// ```
#[derive(Debug, Clone)]
pub struct LogText {
    lines: Vec<String>,
}

/// A regex match located on a specific line.
#[derive(Debug)]
pub struct LineMatch<'a> {
    /// 0-based line index.
    pub index: usize,
    pub captures: Captures<'a>,
}

impl LogText {
    pub fn new(raw: &str) -> Self {
        let lines = raw
            .split('\n')
            .map(|line| {
                let line = line.strip_suffix('\r').unwrap_or(line);
                let line = ansi_escape().replace_all(line, "");
                runner_timestamp().replace(&line, "").into_owned()
            })
            .collect();
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// True when the buffer holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }

    /// First line (by position) on which `re` matches.
    pub fn find<'a>(&'a self, re: &Regex) -> Option<LineMatch<'a>> {
        self.lines.iter().enumerate().find_map(|(index, line)| {
            re.captures(line).map(|captures| LineMatch { index, captures })
        })
    }

    /// Bounded excerpt centered on line `index`.
    ///
    /// Context lines are dropped from the far side first when the excerpt
    /// exceeds `max_evidence_chars`; the matched line itself is cut only as
    /// a last resort. Any reduction is marked in the text and in the flag.
    pub fn evidence(
        &self,
        index: usize,
        source: Option<String>,
        config: &ClassifyConfig,
    ) -> Evidence {
        let cap = config.max_evidence_chars.max(1);
        let last = self.lines.len().saturating_sub(1);
        let index = index.min(last);
        let mut lo = index.saturating_sub(config.context_before);
        let mut hi = (index + config.context_after).min(last);
        let mut truncated = false;

        while window_chars(&self.lines[lo..=hi]) > cap && (lo < index || hi > index) {
            if index - lo >= hi - index {
                lo += 1;
            } else {
                hi -= 1;
            }
            truncated = true;
        }

        let mut excerpt = self.lines[lo..=hi].join("\n");
        if excerpt.chars().count() > cap {
            excerpt = excerpt.chars().take(cap).collect();
            truncated = true;
        }
        if truncated {
            excerpt.push('\n');
            excerpt.push_str(TRUNCATION_MARKER);
        }

        Evidence {
            excerpt,
            line: index + 1,
            source,
            truncated,
        }
    }
}

fn window_chars(lines: &[String]) -> usize {
    let newlines = lines.len().saturating_sub(1);
    lines.iter().map(|l| l.chars().count()).sum::<usize>() + newlines
}
